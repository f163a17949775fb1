use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use crate::cart::{Cart, CartItem, CheckoutInfo};
use crate::errors::ServiceError;
use crate::services::orders::{OrderDraft, OrderService};

/// Result of submitting a cart: business keys of the orders that landed,
/// plus the cart-line ids that did not.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionOutcome {
    pub order_ids: Vec<String>,
    pub failed: Vec<String>,
}

impl SubmissionOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() && !self.order_ids.is_empty()
    }
}

/// Turns a cart into pending orders, one per line item, before any money
/// moves. Creates run concurrently and independently; there is no
/// rollback of lines that landed when a sibling fails.
#[derive(Clone)]
pub struct SubmissionService {
    orders: OrderService,
}

fn draft_for(item: &CartItem, checkout: &CheckoutInfo) -> OrderDraft {
    let mut details = item.service_details.clone();
    details.insert("quantity".into(), json!(item.quantity));
    details.insert("cart_item_id".into(), json!(item.id));

    OrderDraft {
        customer_name: checkout.customer_name.clone(),
        customer_email: Some(checkout.customer_email.clone()),
        customer_notes: checkout.customer_notes.clone(),
        service: item.service.clone(),
        // Unit semantics: the per-unit charge; quantity travels in
        // service_details alongside the originating cart line id.
        amount: item.unit_price(),
        platform: Some(item.platform),
        service_type: Some(item.service_type.clone()),
        delivery_speed: item.delivery_speed.clone(),
        service_details: Some(Value::Object(details)),
        gta_account_email: Some(checkout.gta_account_email.clone()),
        gta_account_password: Some(checkout.gta_account_password.clone()),
        gta_account_credits: item.amount,
        payment_status: None,
        order_status: None,
    }
}

impl SubmissionService {
    pub fn new(orders: OrderService) -> Self {
        Self { orders }
    }

    /// Submits every cart line as its own order. Requires complete
    /// checkout info and a non-empty cart up front; after that, each line
    /// succeeds or fails on its own and the outcome reports both sets.
    #[instrument(skip(self, cart, checkout), fields(items = cart.items.len(), customer = %checkout.customer_name))]
    pub async fn submit(
        &self,
        cart: &Cart,
        checkout: &CheckoutInfo,
    ) -> Result<SubmissionOutcome, ServiceError> {
        if !checkout.is_complete() {
            return Err(ServiceError::ValidationError(
                "Please fill in all required fields".to_string(),
            ));
        }
        if cart.is_empty() {
            return Err(ServiceError::ValidationError(
                "Cart is empty or invalid".to_string(),
            ));
        }

        let creates = cart.items.iter().map(|item| {
            let draft = draft_for(item, checkout);
            let orders = self.orders.clone();
            let cart_item_id = item.id.clone();
            async move { (cart_item_id, orders.create(draft).await) }
        });

        let mut outcome = SubmissionOutcome {
            order_ids: Vec::new(),
            failed: Vec::new(),
        };
        for (cart_item_id, result) in join_all(creates).await {
            match result {
                Ok(order) => outcome.order_ids.push(order.order_id),
                Err(e) => {
                    error!(cart_item_id = %cart_item_id, error = %e, "cart line failed to submit");
                    outcome.failed.push(cart_item_id);
                }
            }
        }

        if outcome.order_ids.is_empty() {
            return Err(ServiceError::InternalError(
                "Failed to create any orders from cart".to_string(),
            ));
        }

        info!(
            created = outcome.order_ids.len(),
            failed = outcome.failed.len(),
            "cart submitted"
        );
        Ok(outcome)
    }
}
