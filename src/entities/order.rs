use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One purchased service unit, tracked through payment and fulfillment.
///
/// `id` is the storage-generated key; `order_id` is the externally visible
/// business key used in URLs and reconciliation lookups. `service_details`
/// is an opaque JSON bag: cart configuration at creation, processor capture
/// metadata after reconciliation. It is only ever merged, never validated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique, indexed)]
    pub order_id: String,

    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_notes: Option<String>,

    pub service: String,
    pub amount: Decimal,
    pub platform: Option<String>,
    pub service_type: Option<String>,
    /// Display label, not a normalized code ("Standard", "Express", ...)
    pub delivery_speed: String,
    #[sea_orm(column_type = "Json", nullable)]
    pub service_details: Option<Json>,

    pub gta_account_email: Option<String>,
    pub gta_account_password: Option<String>,
    pub gta_account_credits: Option<i64>,

    pub payment_status: String,
    pub order_status: String,
    pub admin_notes: Option<String>,

    pub estimated_completion: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
