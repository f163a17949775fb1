use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::cart::Cart;
use crate::config::AppConfig;
use crate::errors::ServiceError;

const ORDER_STATUS_COMPLETED: &str = "COMPLETED";
const CAPTURE_STATUS_COMPLETED: &str = "COMPLETED";
const CURRENCY: &str = "USD";
// PayPal rejects item names/descriptions longer than this.
const MAX_FIELD_LEN: usize = 127;

/// Currency amount as the processor wires it: a code and a 2-decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

impl Money {
    pub fn usd(amount: Decimal) -> Self {
        Self {
            currency_code: CURRENCY.to_string(),
            value: format!("{:.2}", amount),
        }
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.value.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: String,
    pub description: String,
    pub category: String,
    pub sku: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub item_total: Money,
    pub tax_total: Money,
    pub shipping: Money,
    pub handling: Money,
    pub discount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAmount {
    pub currency_code: String,
    pub value: String,
    pub breakdown: AmountBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseUnit {
    pub amount: OrderAmount,
    pub items: Vec<LineItem>,
}

/// Payload for the processor's order-create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderPayload {
    pub intent: String,
    pub purchase_units: Vec<CreatePurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerReceivableBreakdown {
    #[serde(default)]
    pub paypal_fee: Option<Money>,
}

/// One finalized charge inside a processor order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    pub id: String,
    pub status: String,
    pub amount: Money,
    #[serde(default)]
    pub seller_receivable_breakdown: Option<SellerReceivableBreakdown>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentCollection {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseUnit {
    #[serde(default)]
    pub payments: Option<PaymentCollection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub email_address: Option<String>,
}

/// The processor's authoritative order record, as returned by the
/// order-fetch and capture calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
    #[serde(default)]
    pub payer: Option<Payer>,
}

impl ProcessorOrder {
    pub fn is_completed(&self) -> bool {
        self.status == ORDER_STATUS_COMPLETED
    }

    /// Capture sub-records whose own status is completed.
    pub fn completed_captures(&self) -> Vec<&Capture> {
        self.purchase_units
            .iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.iter())
            .filter(|capture| capture.status == CAPTURE_STATUS_COMPLETED)
            .collect()
    }

    pub fn payer_email(&self) -> Option<&str> {
        self.payer
            .as_ref()
            .and_then(|p| p.email_address.as_deref())
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Build the processor order payload from a cart: one line item per cart
/// line, with the breakdown derived from the same unit prices.
pub fn build_order_payload(cart: &Cart) -> Result<CreateOrderPayload, ServiceError> {
    if cart.is_empty() {
        return Err(ServiceError::ValidationError(
            "Cart is empty or invalid".to_string(),
        ));
    }

    let mut items = Vec::with_capacity(cart.items.len());
    for (index, item) in cart.items.iter().enumerate() {
        if item.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Invalid price for item {index}: {}",
                item.price
            )));
        }
        if item.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "Invalid quantity for item {index}: {}",
                item.quantity
            )));
        }

        let description = match item.amount {
            Some(amount) => format!("{} - {} - {}M", item.platform, item.delivery_speed, amount),
            None => format!("{} - {}", item.platform, item.delivery_speed),
        };
        items.push(LineItem {
            name: truncate(&item.service, MAX_FIELD_LEN),
            unit_amount: Money::usd(item.unit_price()),
            quantity: item.quantity.to_string(),
            description: truncate(&description, MAX_FIELD_LEN),
            category: "DIGITAL_GOODS".to_string(),
            sku: format!("item_{index}_{}", item.id),
        });
    }

    // No tax, shipping, handling, or discount in this store, so the
    // grand total is the item total.
    let item_total = cart.total_price();
    let grand_total = item_total;
    let zero = Decimal::ZERO;
    if grand_total <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Order total must be greater than 0".to_string(),
        ));
    }

    let payload = CreateOrderPayload {
        intent: "CAPTURE".to_string(),
        purchase_units: vec![CreatePurchaseUnit {
            amount: OrderAmount {
                currency_code: CURRENCY.to_string(),
                value: format!("{:.2}", grand_total),
                breakdown: AmountBreakdown {
                    item_total: Money::usd(item_total),
                    tax_total: Money::usd(zero),
                    shipping: Money::usd(zero),
                    handling: Money::usd(zero),
                    discount: Money::usd(zero),
                },
            },
            items,
        }],
    };

    validate_order_payload(&payload)?;
    Ok(payload)
}

/// Arithmetic consistency checks the processor would otherwise reject on:
/// line items must sum to the declared item total, and the breakdown must
/// reproduce the grand total, both to the cent.
pub fn validate_order_payload(payload: &CreateOrderPayload) -> Result<(), ServiceError> {
    let cent = dec!(0.01);
    for unit in &payload.purchase_units {
        if unit.items.is_empty() {
            return Err(ServiceError::ValidationError("No items in order".to_string()));
        }

        let parse = |money: &Money, what: &str| -> Result<Decimal, ServiceError> {
            money.amount().ok_or_else(|| {
                ServiceError::ValidationError(format!("Unparseable {what}: {}", money.value))
            })
        };

        let mut line_total = Decimal::ZERO;
        for item in &unit.items {
            let unit_price = parse(&item.unit_amount, "unit amount")?;
            let quantity: Decimal = item.quantity.parse().map_err(|_| {
                ServiceError::ValidationError(format!("Unparseable quantity: {}", item.quantity))
            })?;
            line_total += unit_price * quantity;
        }

        let item_total = parse(&unit.amount.breakdown.item_total, "item total")?;
        if (line_total - item_total).abs() >= cent {
            return Err(ServiceError::ValidationError(format!(
                "Item total mismatch: line items total {line_total:.2}, breakdown item_total {item_total:.2}"
            )));
        }

        let tax = parse(&unit.amount.breakdown.tax_total, "tax total")?;
        let shipping = parse(&unit.amount.breakdown.shipping, "shipping")?;
        let handling = parse(&unit.amount.breakdown.handling, "handling")?;
        let discount = parse(&unit.amount.breakdown.discount, "discount")?;
        let declared_total: Decimal = unit.amount.value.parse().map_err(|_| {
            ServiceError::ValidationError(format!("Unparseable total: {}", unit.amount.value))
        })?;
        let computed_total = item_total + tax + shipping + handling - discount;
        if (computed_total - declared_total).abs() >= cent {
            return Err(ServiceError::ValidationError(format!(
                "Total mismatch: expected {computed_total:.2}, got {declared_total:.2}"
            )));
        }
    }
    Ok(())
}

/// Client for the payment processor's hosted order API: token acquisition,
/// order creation, and capture/fetch. Every round trip carries the
/// configured timeout; a timeout is a transient processor error, distinct
/// from a definitive rejection.
#[derive(Clone)]
pub struct PayPalClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl PayPalClient {
    pub fn new(cfg: &AppConfig) -> Result<Self, ServiceError> {
        Self::from_parts(
            cfg.paypal_base_url(),
            cfg.paypal_client_id.clone(),
            cfg.paypal_client_secret.clone(),
            Duration::from_secs(cfg.paypal_timeout_secs),
        )
    }

    pub fn from_parts(
        base_url: String,
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            client_id,
            client_secret,
        })
    }

    /// Server-to-server client-credentials exchange. Tokens are not cached
    /// across calls; volume here does not justify expiry bookkeeping.
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> Result<String, ServiceError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(ServiceError::CredentialsMissing);
        }

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "processor token request rejected");
            return Err(ServiceError::ProcessorError(format!(
                "token request rejected with status {status}"
            )));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("malformed token response: {e}")))?;
        Ok(token.access_token)
    }

    /// Creates a processor-side order for the cart and returns its id.
    /// The payload is arithmetic-checked locally first; a mismatched
    /// breakdown never goes upstream.
    #[instrument(skip(self, cart))]
    pub async fn create_order(&self, cart: &Cart) -> Result<String, ServiceError> {
        let payload = build_order_payload(cart)?;
        let token = self.get_access_token().await?;

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("order create failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "processor order create rejected");
            return Err(ServiceError::ProcessorError(format!(
                "order create rejected with status {status}"
            )));
        }

        let created: CreateOrderResponse = response.json().await.map_err(|e| {
            ServiceError::ProcessorError(format!("malformed order create response: {e}"))
        })?;
        info!(processor_order_id = %created.id, "processor order created");
        Ok(created.id)
    }

    /// Re-fetches the authoritative order record by id. Reconciliation
    /// always goes through this; client-supplied capture data is never
    /// trusted directly.
    #[instrument(skip(self))]
    pub async fn get_order(&self, processor_order_id: &str) -> Result<ProcessorOrder, ServiceError> {
        let token = self.get_access_token().await?;

        let response = self
            .http
            .get(format!(
                "{}/v2/checkout/orders/{processor_order_id}",
                self.base_url
            ))
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("order fetch failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "processor order fetch rejected");
            return Err(ServiceError::ProcessorError(format!(
                "order fetch rejected with status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("malformed order response: {e}")))
    }

    /// Finalizes payment for a processor order and returns the resulting
    /// record, capture sub-records included. A rejected capture is terminal
    /// for that processor order.
    #[instrument(skip(self))]
    pub async fn capture_order(
        &self,
        processor_order_id: &str,
    ) -> Result<ProcessorOrder, ServiceError> {
        let token = self.get_access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{processor_order_id}/capture",
                self.base_url
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("capture failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "processor capture rejected");
            return Err(ServiceError::ProcessorError(format!(
                "capture rejected with status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::ProcessorError(format!("malformed capture response: {e}")))
    }
}
