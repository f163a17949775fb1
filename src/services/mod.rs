pub mod orders;
pub mod paypal;
pub mod reconciliation;
pub mod submission;
