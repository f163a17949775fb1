use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::AdminAuth;
use crate::cart::{Cart, CheckoutInfo};
use crate::errors::ServiceError;
use crate::services::orders::{AdminOrderView, OrderDraft, OrderService, UpdateOrder};
use crate::services::submission::SubmissionOutcome;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    /// Case-insensitive substring over order id, customer, email, service
    pub search: Option<String>,
}

/// Cart checkout submission: every line item becomes its own order.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SubmitCartRequest {
    pub cart: Cart,
    pub checkout: CheckoutInfo,
}

#[utoipa::path(
    post,
    path = "/orders",
    request_body = OrderDraft,
    responses(
        (status = 200, description = "Order created", body = ApiResponse<AdminOrderView>),
        (status = 400, description = "Missing required fields"),
        (status = 500, description = "Storage failure")
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> ApiResult<AdminOrderView> {
    draft
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let order = state.services.orders.create(draft).await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

#[utoipa::path(
    get,
    path = "/orders",
    params(("search" = Option<String>, Query, description = "Substring filter")),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<AdminOrderView>>),
        (status = 500, description = "Storage failure")
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<Vec<AdminOrderView>> {
    let orders = match query.search.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => state.services.orders.search(q).await?,
        _ => state.services.orders.list_all().await?,
    };
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    params(("order_id" = String, Path, description = "Business key, e.g. GB-XXXXXXXXXXXX")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<AdminOrderView>),
        (status = 404, description = "No such order"),
        (status = 500, description = "Storage failure")
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<AdminOrderView> {
    let order = state.services.orders.get_by_order_id(&order_id).await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

#[utoipa::path(
    put,
    path = "/orders/{order_id}",
    params(("order_id" = String, Path, description = "Business key")),
    request_body = UpdateOrder,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<AdminOrderView>),
        (status = 400, description = "Invalid status transition"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "No such order")
    ),
    security(("admin_token" = [])),
    tag = "orders"
)]
pub async fn update_order(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(update): Json<UpdateOrder>,
) -> ApiResult<AdminOrderView> {
    let order = state.services.orders.update(&order_id, update).await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

#[utoipa::path(
    post,
    path = "/orders/submit",
    request_body = SubmitCartRequest,
    responses(
        (status = 200, description = "Cart submitted; per-line outcome", body = ApiResponse<SubmissionOutcome>),
        (status = 400, description = "Incomplete checkout info or empty cart"),
        (status = 500, description = "No order could be created")
    ),
    tag = "orders"
)]
pub async fn submit_cart(
    State(state): State<AppState>,
    Json(request): Json<SubmitCartRequest>,
) -> ApiResult<SubmissionOutcome> {
    let outcome = state
        .services
        .submission
        .submit(&request.cart, &request.checkout)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
