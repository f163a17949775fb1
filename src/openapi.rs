use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct AdminTokenScheme;

impl Modify for AdminTokenScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Admin API key configured server-side"))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GameBoost API",
        version = "0.1.0",
        description = r#"
Order lifecycle and payment reconciliation API for a game-account
boosting storefront.

Public endpoints cover order creation, cart submission, lookup, and
payment verification. Admin mutation endpoints require a bearer token:

```
Authorization: Bearer <admin-api-key>
```

Errors share one shape:

```json
{
  "error": "Bad Request",
  "message": "Validation error: ...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order creation, lookup, and updates"),
        (name = "payments", description = "Processor order creation and capture verification"),
        (name = "admin", description = "Operator mutations, bearer-token guarded")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::submit_cart,
        crate::handlers::payments::create_processor_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::admin::mark_paid,
        crate::handlers::admin::mark_completed,
        crate::handlers::admin::update_status,
        crate::handlers::admin::update_notes,
        crate::handlers::admin::search_orders,
        crate::handlers::admin::orders_by_customer,
        crate::handlers::admin::orders_by_status,
        crate::handlers::admin::order_stats,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::cart::Cart,
            crate::cart::CartItem,
            crate::cart::CheckoutInfo,
            crate::models::OrderStatus,
            crate::models::PaymentStatus,
            crate::models::Platform,
            crate::services::orders::OrderDraft,
            crate::services::orders::UpdateOrder,
            crate::services::orders::AdminOrderView,
            crate::services::orders::OrderStats,
            crate::services::submission::SubmissionOutcome,
            crate::services::reconciliation::VerifyRequest,
            crate::services::reconciliation::CaptureSummary,
            crate::services::reconciliation::ReconciliationSummary,
            crate::handlers::orders::SubmitCartRequest,
            crate::handlers::payments::CreateProcessorOrderRequest,
            crate::handlers::payments::CreateProcessorOrderResponse,
            crate::handlers::admin::MarkPaidRequest,
            crate::handlers::admin::UpdateStatusRequest,
            crate::handlers::admin::UpdateNotesRequest,
            crate::errors::ErrorResponse,
        )
    ),
    modifiers(&AdminTokenScheme)
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
