pub mod admin;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::orders::OrderService;
use crate::services::paypal::PayPalClient;
use crate::services::reconciliation::ReconciliationService;
use crate::services::submission::SubmissionService;

/// Service registry shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub submission: SubmissionService,
    pub paypal: PayPalClient,
    pub reconciliation: ReconciliationService,
}

impl AppServices {
    pub fn build(
        db: Arc<DbPool>,
        config: &AppConfig,
        event_sender: Option<EventSender>,
    ) -> Result<Self, ServiceError> {
        let orders = OrderService::new(db, event_sender.clone());
        let paypal = PayPalClient::new(config)?;
        let submission = SubmissionService::new(orders.clone());
        let reconciliation =
            ReconciliationService::new(orders.clone(), paypal.clone(), event_sender);
        Ok(Self {
            orders,
            submission,
            paypal,
            reconciliation,
        })
    }
}
