use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cart::Cart;
use crate::services::reconciliation::{ReconciliationSummary, VerifyRequest};
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateProcessorOrderRequest {
    pub cart: Cart,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateProcessorOrderResponse {
    pub paypal_order_id: String,
}

/// Creates the processor-side order the customer approves in the PayPal
/// flow. Breakdown arithmetic is validated before anything leaves the
/// process.
#[utoipa::path(
    post,
    path = "/payment/create-order",
    request_body = CreateProcessorOrderRequest,
    responses(
        (status = 200, description = "Processor order created", body = ApiResponse<CreateProcessorOrderResponse>),
        (status = 400, description = "Empty cart or inconsistent totals"),
        (status = 502, description = "Processor unreachable or rejected the request")
    ),
    tag = "payments"
)]
pub async fn create_processor_order(
    State(state): State<AppState>,
    Json(request): Json<CreateProcessorOrderRequest>,
) -> ApiResult<CreateProcessorOrderResponse> {
    let paypal_order_id = state.services.paypal.create_order(&request.cart).await?;
    Ok(Json(ApiResponse::success(CreateProcessorOrderResponse {
        paypal_order_id,
    })))
}

/// Reconciliation entry point, hit from both the client-side approval
/// callback and the success-page check. Safe to call twice for the same
/// processor order.
#[utoipa::path(
    post,
    path = "/payment/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Capture verified and orders settled", body = ApiResponse<ReconciliationSummary>),
        (status = 400, description = "Missing processor order id, or payment not completed"),
        (status = 500, description = "Capture verified but no order updated or created"),
        (status = 502, description = "Processor unreachable")
    ),
    tag = "payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<ReconciliationSummary> {
    let summary = state.services.reconciliation.reconcile(request).await?;
    Ok(Json(ApiResponse::success(summary)))
}
