use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Platform;

/// One configured service in the cart. `id` is a locally generated key;
/// nothing here exists server-side until submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: String,
    pub service: String,
    /// In-game amount the service delivers (e.g. millions of cash)
    #[serde(default)]
    pub amount: Option<i64>,
    pub price: Decimal,
    pub platform: Platform,
    pub delivery_speed: String,
    #[serde(default)]
    pub delivery_cost: Decimal,
    pub service_type: String,
    /// Open-ended per-service configuration, carried into the order
    #[serde(default)]
    #[schema(value_type = Object)]
    pub service_details: Map<String, Value>,
    pub quantity: u32,
}

impl CartItem {
    /// Price actually charged per unit: base price plus delivery surcharge.
    pub fn unit_price(&self) -> Decimal {
        (self.price + self.delivery_cost).round_dp(2)
    }

    pub fn line_total(&self) -> Decimal {
        (self.unit_price() * Decimal::from(self.quantity)).round_dp(2)
    }
}

/// Ordered collection of line items with derived totals. Pure state
/// container: mutations never touch the network.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .map(CartItem::line_total)
            .sum::<Decimal>()
            .round_dp(2)
    }

    /// Add a line item. An item with the same id has its quantity bumped
    /// instead of producing a duplicate line.
    pub fn add_item(&mut self, mut item: CartItem) -> String {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            existing.quantity += item.quantity;
            return existing.id.clone();
        }
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    pub fn remove_item(&mut self, id: &str) {
        self.items.retain(|i| i.id != id);
    }

    /// Set a line's quantity; zero removes the line.
    pub fn update_quantity(&mut self, id: &str, quantity: u32) {
        if quantity == 0 {
            self.remove_item(id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.quantity = quantity;
        }
    }

    /// Cleared after successful submission.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Customer-supplied checkout fields gating submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutInfo {
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_notes: Option<String>,
    pub gta_account_email: String,
    pub gta_account_password: String,
}

impl CheckoutInfo {
    /// Submission precondition: name, email, and the fulfillment account
    /// credentials must all be present before payment is attempted.
    pub fn is_complete(&self) -> bool {
        !self.customer_name.trim().is_empty()
            && !self.customer_email.trim().is_empty()
            && !self.gta_account_email.trim().is_empty()
            && !self.gta_account_password.is_empty()
    }
}
