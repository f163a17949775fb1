use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use crate::cart::{Cart, CartItem, CheckoutInfo};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{OrderStatus, PaymentStatus};
use crate::services::orders::{OrderDraft, OrderService};
use crate::services::paypal::{Capture, PayPalClient, ProcessorOrder};

/// Key stamped into `service_details` when capture data lands. Its
/// presence marks an order as already enriched; replays leave it alone.
const ENRICHED_MARKER: &str = "payment_completed_at";

/// Client-initiated verify request. Everything in here is advisory: the
/// processor record is re-fetched server-side and is the only authority.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// Processor-side order id returned at checkout approval.
    pub paypal_order_id: String,
    /// Business keys of orders created before payment, if any.
    #[serde(default)]
    pub order_ids: Vec<String>,
    /// Cart snapshot for the fallback creation path.
    #[serde(default)]
    pub cart: Option<Cart>,
    /// Checkout fields for the fallback creation path.
    #[serde(default)]
    pub checkout: Option<CheckoutInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaptureSummary {
    pub capture_id: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationSummary {
    pub paypal_order_id: String,
    pub paypal_status: String,
    pub payer_email: Option<String>,
    pub captures: Vec<CaptureSummary>,
    pub orders_updated: Vec<String>,
    pub orders_created: Vec<String>,
    pub orders_failed: Vec<String>,
}

/// Post-payment reconciliation: re-fetches the processor record, drives
/// local orders from (Pending, Pending) to (Completed, Processing), and
/// enriches them with capture data. Runs from both the return-URL hook
/// and the explicit verify endpoint; every step tolerates the other
/// trigger having won the race.
#[derive(Clone)]
pub struct ReconciliationService {
    orders: OrderService,
    paypal: PayPalClient,
    event_sender: Option<EventSender>,
}

fn capture_enrichment(
    processor_order: &ProcessorOrder,
    capture: &Capture,
    completed_at: &str,
) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("paypal_order_id".into(), json!(processor_order.id));
    details.insert("paypal_capture_id".into(), json!(capture.id));
    details.insert("payment_method".into(), json!("PayPal"));
    details.insert(ENRICHED_MARKER.into(), json!(completed_at));
    details.insert("paypal_amount".into(), json!(capture.amount.value));
    if let Some(email) = processor_order.payer_email() {
        details.insert("paypal_payer_email".into(), json!(email));
    }
    if let Some(fee) = capture
        .seller_receivable_breakdown
        .as_ref()
        .and_then(|b| b.paypal_fee.as_ref())
    {
        details.insert("paypal_transaction_fee".into(), json!(fee.value));
    }
    details
}

fn is_enriched(details: Option<&Value>) -> bool {
    matches!(details, Some(Value::Object(map)) if map.contains_key(ENRICHED_MARKER))
}

/// In-game credit total for a fallback-created order, read from the cart
/// line's own configuration with the line `amount` as a last resort.
fn credits_for(item: &CartItem) -> Option<i64> {
    for key in ["moneyAmount", "cashAmount", "creditAmount"] {
        if let Some(value) = item.service_details.get(key) {
            if let Some(n) = value.as_i64() {
                return Some(n);
            }
            if let Some(s) = value.as_str() {
                if let Ok(n) = s.parse::<i64>() {
                    return Some(n);
                }
            }
        }
    }
    item.amount
}

impl ReconciliationService {
    pub fn new(
        orders: OrderService,
        paypal: PayPalClient,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            orders,
            paypal,
            event_sender,
        }
    }

    /// Verifies a capture against the processor and settles local orders.
    ///
    /// Overall success requires at least one order updated or created;
    /// per-order failures are collected, not fatal, so a partial landing
    /// is reported as success with the remainder listed for admin repair.
    #[instrument(skip(self, request), fields(paypal_order_id = %request.paypal_order_id))]
    pub async fn reconcile(
        &self,
        request: VerifyRequest,
    ) -> Result<ReconciliationSummary, ServiceError> {
        if request.paypal_order_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "PayPal order ID is required".to_string(),
            ));
        }

        let processor_order = self.paypal.get_order(&request.paypal_order_id).await?;
        if !processor_order.is_completed() {
            // Approved-but-not-captured never settles anything locally.
            return Err(ServiceError::PaymentNotCompleted(
                processor_order.status.clone(),
            ));
        }

        let captures = processor_order.completed_captures();
        let capture = *captures
            .first()
            .ok_or(ServiceError::NoCompletedCapture)?;
        let completed_at = chrono::Utc::now().to_rfc3339();

        let mut summary = ReconciliationSummary {
            paypal_order_id: processor_order.id.clone(),
            paypal_status: processor_order.status.clone(),
            payer_email: processor_order.payer_email().map(str::to_string),
            captures: captures
                .iter()
                .map(|c| CaptureSummary {
                    capture_id: c.id.clone(),
                    status: c.status.clone(),
                    amount: c.amount.value.clone(),
                    currency: c.amount.currency_code.clone(),
                })
                .collect(),
            orders_updated: Vec::new(),
            orders_created: Vec::new(),
            orders_failed: Vec::new(),
        };

        if !request.order_ids.is_empty() {
            for order_id in &request.order_ids {
                match self
                    .settle_existing(order_id, &processor_order, capture, &completed_at)
                    .await
                {
                    Ok(()) => summary.orders_updated.push(order_id.clone()),
                    Err(e) => {
                        error!(order_id = %order_id, error = %e, "failed to settle order");
                        summary.orders_failed.push(order_id.clone());
                    }
                }
            }
        } else if let (Some(cart), Some(checkout)) = (&request.cart, &request.checkout) {
            // No pre-payment orders to settle: materialize them now from
            // the cart snapshot, already paid and in fulfillment.
            self.create_from_cart(
                cart,
                checkout,
                &processor_order,
                capture,
                &completed_at,
                &mut summary,
            )
            .await;
        }

        if summary.orders_updated.is_empty() && summary.orders_created.is_empty() {
            error!(
                paypal_order_id = %processor_order.id,
                "payment captured but no orders were updated or created"
            );
            return Err(ServiceError::ReconciliationFailed);
        }

        info!(
            paypal_order_id = %processor_order.id,
            updated = summary.orders_updated.len(),
            created = summary.orders_created.len(),
            failed = summary.orders_failed.len(),
            "payment reconciled"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::PaymentCaptured {
                    processor_order_id: processor_order.id.clone(),
                    orders_updated: summary.orders_updated.len(),
                    orders_created: summary.orders_created.len(),
                })
                .await
            {
                warn!(error = %e, "failed to send payment event");
            }
        }

        Ok(summary)
    }

    /// Settles one pre-existing order: conditional status flips plus
    /// enrichment, each leg independently replay-safe.
    async fn settle_existing(
        &self,
        order_id: &str,
        processor_order: &ProcessorOrder,
        capture: &Capture,
        completed_at: &str,
    ) -> Result<(), ServiceError> {
        let order = self.orders.get_by_order_id(order_id).await?;

        let payment_flipped = self.orders.complete_payment_if_pending(order_id).await?;
        let status_flipped = self.orders.begin_processing_if_pending(order_id).await?;

        if is_enriched(order.service_details.as_ref()) {
            info!(order_id = %order_id, "order already enriched, skipping");
            return Ok(());
        }
        self.orders
            .merge_service_details(
                order_id,
                capture_enrichment(processor_order, capture, completed_at),
            )
            .await?;

        info!(
            order_id = %order_id,
            payment_flipped,
            status_flipped,
            "order settled from capture"
        );
        Ok(())
    }

    async fn create_from_cart(
        &self,
        cart: &Cart,
        checkout: &CheckoutInfo,
        processor_order: &ProcessorOrder,
        capture: &Capture,
        completed_at: &str,
        summary: &mut ReconciliationSummary,
    ) {
        for item in &cart.items {
            let mut details = item.service_details.clone();
            details.insert("quantity".into(), json!(item.quantity));
            details.insert("cart_item_id".into(), json!(item.id));
            for (key, value) in capture_enrichment(processor_order, capture, completed_at) {
                details.insert(key, value);
            }

            let draft = OrderDraft {
                customer_name: checkout.customer_name.clone(),
                customer_email: Some(checkout.customer_email.clone()),
                customer_notes: checkout.customer_notes.clone(),
                service: item.service.clone(),
                amount: item.unit_price(),
                platform: Some(item.platform),
                service_type: Some(item.service_type.clone()),
                delivery_speed: item.delivery_speed.clone(),
                service_details: Some(Value::Object(details)),
                gta_account_email: Some(checkout.gta_account_email.clone()),
                gta_account_password: Some(checkout.gta_account_password.clone()),
                gta_account_credits: credits_for(item),
                payment_status: Some(PaymentStatus::Completed),
                order_status: Some(OrderStatus::Processing),
            };

            match self.orders.create(draft).await {
                Ok(order) => summary.orders_created.push(order.order_id),
                Err(e) => {
                    error!(cart_item_id = %item.id, error = %e, "fallback order creation failed");
                    summary.orders_failed.push(item.id.clone());
                }
            }
        }
    }
}
