use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as OrderEntity, Model as OrderModel,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{OrderStatus, PaymentStatus, Platform};

/// Fields a caller supplies to create an order. The repository fills the
/// status pair with `(Pending, Pending)` when absent and issues the
/// business key.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderDraft {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_notes: Option<String>,

    #[validate(length(min = 1, message = "Service is required"))]
    pub service: String,
    pub amount: Decimal,
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[validate(length(min = 1, message = "Delivery speed is required"))]
    pub delivery_speed: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub service_details: Option<Value>,

    #[serde(default)]
    pub gta_account_email: Option<String>,
    #[serde(default)]
    pub gta_account_password: Option<String>,
    #[serde(default)]
    pub gta_account_credits: Option<i64>,

    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
}

/// Partial update. `amount` is deliberately absent: it is fixed at order
/// creation and never recomputed. Status fields go through the transition
/// table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrder {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub service_type: Option<String>,
    pub delivery_speed: Option<String>,
    pub platform: Option<Platform>,
    #[schema(value_type = Object)]
    pub service_details: Option<Value>,
    pub gta_account_email: Option<String>,
    pub gta_account_password: Option<String>,
    pub gta_account_credits: Option<i64>,
    pub payment_status: Option<PaymentStatus>,
    pub order_status: Option<OrderStatus>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Read-only listing projection. Sourced from the same rows as the orders
/// table; the fulfillment-account password never appears here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminOrderView {
    pub order_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub delivery_speed: String,
    pub service: String,
    pub amount: Decimal,
    pub payment_status: String,
    pub order_status: String,
    pub platform: Option<String>,
    pub service_type: Option<String>,
    #[schema(value_type = Object)]
    pub service_details: Option<Value>,
    pub customer_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub gta_account_email: Option<String>,
    pub gta_account_credits: Option<i64>,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expected_completion: DateTime<Utc>,
}

/// Aggregate counts for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStats {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub total_revenue: Decimal,
}

/// Persistence layer over the orders table. Every write runs a single
/// call path with one retry on transient connection errors.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

fn is_transient(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

fn parse_payment_status(raw: &str) -> Result<PaymentStatus, ServiceError> {
    PaymentStatus::from_str(raw)
        .map_err(|_| ServiceError::InternalError(format!("Unknown payment status in row: {raw}")))
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw)
        .map_err(|_| ServiceError::InternalError(format!("Unknown order status in row: {raw}")))
}

/// Rough fulfillment-window estimate by delivery tier, for display only.
fn expected_completion_for(speed: &str, from: DateTime<Utc>) -> DateTime<Utc> {
    let window = match speed {
        "1h" => Duration::hours(1),
        "6h" => Duration::hours(6),
        "24h" | "Express" => Duration::hours(24),
        "Ultra Express" => Duration::hours(12),
        _ => Duration::hours(72),
    };
    from + window
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    fn generate_order_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(|c| (c as char).to_ascii_uppercase())
            .collect();
        format!("GB-{suffix}")
    }

    async fn send_event(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send order event");
            }
        }
    }

    /// Creates one durable order row and returns it as stored.
    #[instrument(skip(self, draft), fields(customer_name = %draft.customer_name, service = %draft.service))]
    pub async fn create(&self, draft: OrderDraft) -> Result<OrderModel, ServiceError> {
        draft
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let order_id = Self::generate_order_id();
        let payment_status = draft.payment_status.unwrap_or(PaymentStatus::Pending);
        let order_status = draft.order_status.unwrap_or(OrderStatus::Pending);

        let active = OrderActiveModel {
            order_id: Set(order_id.clone()),
            customer_name: Set(draft.customer_name),
            customer_email: Set(draft.customer_email),
            customer_notes: Set(draft.customer_notes),
            service: Set(draft.service),
            amount: Set(draft.amount.round_dp(2)),
            platform: Set(draft.platform.map(|p| p.to_string())),
            service_type: Set(draft.service_type),
            delivery_speed: Set(draft.delivery_speed),
            service_details: Set(draft.service_details),
            gta_account_email: Set(draft.gta_account_email),
            gta_account_password: Set(draft.gta_account_password),
            gta_account_credits: Set(draft.gta_account_credits),
            payment_status: Set(payment_status.to_string()),
            order_status: Set(order_status.to_string()),
            admin_notes: Set(None),
            estimated_completion: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = match active.clone().insert(&*self.db).await {
            Ok(model) => model,
            Err(e) if is_transient(&e) => {
                warn!(error = %e, order_id = %order_id, "transient failure creating order, retrying once");
                active.insert(&*self.db).await.map_err(|retry_err| {
                    error!(error = %retry_err, order_id = %order_id, "retry failed creating order");
                    ServiceError::DatabaseError(retry_err)
                })?
            }
            Err(e) => {
                error!(error = %e, order_id = %order_id, "failed to create order");
                return Err(ServiceError::DatabaseError(e));
            }
        };

        info!(order_id = %inserted.order_id, "order created");
        self.send_event(Event::OrderCreated {
            order_id: inserted.order_id.clone(),
        })
        .await;

        Ok(inserted)
    }

    /// Exact-match lookup on the business key.
    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Option<OrderModel>, ServiceError> {
        let order = OrderEntity::find()
            .filter(Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        Ok(order)
    }

    /// Business-key lookup that treats absence as an error.
    #[instrument(skip(self))]
    pub async fn get_by_order_id(&self, order_id: &str) -> Result<OrderModel, ServiceError> {
        self.find_by_order_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))
    }

    /// Transition-checked payment status update.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %status))]
    pub async fn update_payment_status(
        &self,
        order_id: &str,
        status: PaymentStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_by_order_id(order_id).await?;
        let current = parse_payment_status(&order.payment_status)?;
        if current == status {
            return Ok(order);
        }
        if !current.can_transition_to(status) {
            return Err(ServiceError::InvalidTransition(format!(
                "payment_status {current} -> {status} is not permitted"
            )));
        }

        let mut active: OrderActiveModel = order.into();
        active.payment_status = Set(status.to_string());
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        info!(order_id = %order_id, status = %status, "payment status updated");
        Ok(updated)
    }

    /// Transition-checked order status update. Moving to `Completed` stamps
    /// `completed_at` in the same logical update.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %status))]
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_by_order_id(order_id).await?;
        let current = parse_order_status(&order.order_status)?;
        if current == status {
            return Ok(order);
        }
        if !current.can_transition_to(status) {
            return Err(ServiceError::InvalidTransition(format!(
                "order_status {current} -> {status} is not permitted"
            )));
        }

        let old_status = order.order_status.clone();
        let now = Utc::now();
        let mut active: OrderActiveModel = order.into();
        active.order_status = Set(status.to_string());
        active.updated_at = Set(now);
        if status == OrderStatus::Completed {
            active.completed_at = Set(Some(now));
        }
        let updated = active.update(&*self.db).await?;

        info!(order_id = %order_id, old_status = %old_status, new_status = %status, "order status updated");
        self.send_event(Event::OrderStatusChanged {
            order_id: order_id.to_string(),
            old_status,
            new_status: status.to_string(),
        })
        .await;
        if status == OrderStatus::Completed {
            self.send_event(Event::OrderCompleted {
                order_id: order_id.to_string(),
            })
            .await;
        }

        Ok(updated)
    }

    /// Conditional update: `payment_status = Completed` only while the row
    /// is still `Pending`. Returns whether a row changed; a second
    /// concurrent caller sees `false` and nothing else happens, which makes
    /// replayed reconciliation a storage-level no-op.
    #[instrument(skip(self))]
    pub async fn complete_payment_if_pending(&self, order_id: &str) -> Result<bool, ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(
                Column::PaymentStatus,
                Expr::value(PaymentStatus::Completed.to_string()),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::OrderId.eq(order_id))
            .filter(Column::PaymentStatus.eq(PaymentStatus::Pending.to_string()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Conditional update: `order_status = Processing` only while `Pending`.
    #[instrument(skip(self))]
    pub async fn begin_processing_if_pending(&self, order_id: &str) -> Result<bool, ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(
                Column::OrderStatus,
                Expr::value(OrderStatus::Processing.to_string()),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::OrderId.eq(order_id))
            .filter(Column::OrderStatus.eq(OrderStatus::Pending.to_string()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Partial field merge. Nested `service_details` must be pre-merged by
    /// the caller (see [`merge_service_details`](Self::merge_service_details)).
    #[instrument(skip(self, update), fields(order_id = %order_id))]
    pub async fn update(
        &self,
        order_id: &str,
        update: UpdateOrder,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_by_order_id(order_id).await?;
        let current_payment = parse_payment_status(&order.payment_status)?;
        let current_order = parse_order_status(&order.order_status)?;
        let now = Utc::now();

        let mut active: OrderActiveModel = order.into();

        if let Some(v) = update.customer_name {
            active.customer_name = Set(v);
        }
        if let Some(v) = update.customer_email {
            active.customer_email = Set(Some(v));
        }
        if let Some(v) = update.customer_notes {
            active.customer_notes = Set(Some(v));
        }
        if let Some(v) = update.admin_notes {
            active.admin_notes = Set(Some(v));
        }
        if let Some(v) = update.service_type {
            active.service_type = Set(Some(v));
        }
        if let Some(v) = update.delivery_speed {
            active.delivery_speed = Set(v);
        }
        if let Some(v) = update.platform {
            active.platform = Set(Some(v.to_string()));
        }
        if let Some(v) = update.service_details {
            active.service_details = Set(Some(v));
        }
        if let Some(v) = update.gta_account_email {
            active.gta_account_email = Set(Some(v));
        }
        if let Some(v) = update.gta_account_password {
            active.gta_account_password = Set(Some(v));
        }
        if let Some(v) = update.gta_account_credits {
            active.gta_account_credits = Set(Some(v));
        }
        if let Some(v) = update.estimated_completion {
            active.estimated_completion = Set(Some(v));
        }

        if let Some(status) = update.payment_status {
            if status != current_payment {
                if !current_payment.can_transition_to(status) {
                    return Err(ServiceError::InvalidTransition(format!(
                        "payment_status {current_payment} -> {status} is not permitted"
                    )));
                }
                active.payment_status = Set(status.to_string());
            }
        }
        if let Some(status) = update.order_status {
            if status != current_order {
                if !current_order.can_transition_to(status) {
                    return Err(ServiceError::InvalidTransition(format!(
                        "order_status {current_order} -> {status} is not permitted"
                    )));
                }
                active.order_status = Set(status.to_string());
                if status == OrderStatus::Completed {
                    active.completed_at = Set(Some(now));
                }
            }
        }

        active.updated_at = Set(now);
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    /// Read-merge-write enrichment of the `service_details` bag. Keys are
    /// overwritten, never deleted wholesale.
    #[instrument(skip(self, patch), fields(order_id = %order_id))]
    pub async fn merge_service_details(
        &self,
        order_id: &str,
        patch: Map<String, Value>,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_by_order_id(order_id).await?;
        let mut details = match &order.service_details {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        for (key, value) in patch {
            details.insert(key, value);
        }

        let mut active: OrderActiveModel = order.into();
        active.service_details = Set(Some(Value::Object(details)));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    /// Project a row into the admin view; the account password stays behind.
    pub fn to_view(order: OrderModel) -> AdminOrderView {
        let expected_completion = expected_completion_for(&order.delivery_speed, order.created_at);
        AdminOrderView {
            order_id: order.order_id,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            delivery_speed: order.delivery_speed,
            service: order.service,
            amount: order.amount,
            payment_status: order.payment_status,
            order_status: order.order_status,
            platform: order.platform,
            service_type: order.service_type,
            service_details: order.service_details,
            customer_notes: order.customer_notes,
            admin_notes: order.admin_notes,
            gta_account_email: order.gta_account_email,
            gta_account_credits: order.gta_account_credits,
            order_date: order.created_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
            estimated_completion: order.estimated_completion,
            completed_at: order.completed_at,
            expected_completion,
        }
    }

    /// All orders through the admin projection, newest first.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<AdminOrderView>, ServiceError> {
        let orders = OrderEntity::find()
            .order_by_desc(Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders.into_iter().map(Self::to_view).collect())
    }

    /// Case-insensitive substring search over order id, customer name,
    /// email, and service description.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<AdminOrderView>, ServiceError> {
        let pattern = format!("%{}%", query.to_lowercase());
        let condition = Condition::any()
            .add(Expr::expr(Func::lower(Expr::col(Column::OrderId))).like(pattern.clone()))
            .add(Expr::expr(Func::lower(Expr::col(Column::CustomerName))).like(pattern.clone()))
            .add(Expr::expr(Func::lower(Expr::col(Column::CustomerEmail))).like(pattern.clone()))
            .add(Expr::expr(Func::lower(Expr::col(Column::Service))).like(pattern));
        let orders = OrderEntity::find()
            .filter(condition)
            .order_by_desc(Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders.into_iter().map(Self::to_view).collect())
    }

    /// All orders belonging to one customer email, newest first. Matching
    /// is case-insensitive; emails arrive in whatever casing the checkout
    /// form captured.
    #[instrument(skip(self))]
    pub async fn list_by_customer(
        &self,
        email: &str,
    ) -> Result<Vec<AdminOrderView>, ServiceError> {
        let needle = email.trim().to_lowercase();
        let orders = OrderEntity::find()
            .filter(Expr::expr(Func::lower(Expr::col(Column::CustomerEmail))).eq(needle))
            .order_by_desc(Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders.into_iter().map(Self::to_view).collect())
    }

    /// Orders currently in one fulfillment state, newest first.
    #[instrument(skip(self))]
    pub async fn list_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<AdminOrderView>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(Column::OrderStatus.eq(status.to_string()))
            .order_by_desc(Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders.into_iter().map(Self::to_view).collect())
    }

    /// Aggregate counts; revenue sums `amount` over payment-completed rows.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<OrderStats, ServiceError> {
        let orders = OrderEntity::find().all(&*self.db).await?;
        let mut stats = OrderStats {
            total: orders.len() as u64,
            pending: 0,
            processing: 0,
            completed: 0,
            cancelled: 0,
            total_revenue: Decimal::ZERO,
        };
        for order in &orders {
            match order.order_status.as_str() {
                "Pending" => stats.pending += 1,
                "Processing" | "In Progress" => stats.processing += 1,
                "Completed" => stats.completed += 1,
                "Cancelled" => stats.cancelled += 1,
                _ => {}
            }
            if order.payment_status == PaymentStatus::Completed.to_string() {
                stats.total_revenue += order.amount;
            }
        }
        Ok(stats)
    }

    /// Admin one-click: payment confirmed, order moves to fulfillment.
    /// Safe to repeat; the conditional updates no-op once applied.
    #[instrument(skip(self, capture_details), fields(order_id = %order_id))]
    pub async fn mark_payment_completed(
        &self,
        order_id: &str,
        capture_details: Option<Map<String, Value>>,
    ) -> Result<OrderModel, ServiceError> {
        // Existence check up front so an unknown id is a 404, not a silent no-op.
        self.get_by_order_id(order_id).await?;

        self.complete_payment_if_pending(order_id).await?;
        self.begin_processing_if_pending(order_id).await?;

        if let Some(details) = capture_details {
            return self.merge_service_details(order_id, details).await;
        }
        self.get_by_order_id(order_id).await
    }

    /// Admin one-click: service delivered. Repeating it re-stamps
    /// `completed_at` at the newer call time; the status itself is
    /// idempotent.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_order_completed(&self, order_id: &str) -> Result<OrderModel, ServiceError> {
        let order = self.get_by_order_id(order_id).await?;
        let current = parse_order_status(&order.order_status)?;
        let now = Utc::now();

        if current == OrderStatus::Completed {
            let mut active: OrderActiveModel = order.into();
            active.completed_at = Set(Some(now));
            active.updated_at = Set(now);
            return Ok(active.update(&*self.db).await?);
        }

        self.update_order_status(order_id, OrderStatus::Completed)
            .await
    }
}
