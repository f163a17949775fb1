use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::AdminAuth;
use crate::errors::ServiceError;
use crate::models::{OrderStatus, PaymentStatus};
use crate::services::orders::{AdminOrderView, OrderService, OrderStats, UpdateOrder};
use crate::{ApiResponse, ApiResult, AppState};

/// Optional capture metadata to merge into `service_details` when an
/// operator marks an order paid out of band (e.g. a manual transfer).
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct MarkPaidRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub capture_details: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateNotesRequest {
    pub admin_notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomerQuery {
    pub email: String,
}

/// One-click "payment received": flips the status pair to
/// (Completed, Processing) where still pending, optionally merging capture
/// metadata. Repeating it is harmless.
#[utoipa::path(
    post,
    path = "/admin/orders/{order_id}/mark-paid",
    params(("order_id" = String, Path, description = "Business key")),
    request_body = MarkPaidRequest,
    responses(
        (status = 200, description = "Order marked paid", body = ApiResponse<AdminOrderView>),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "No such order")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn mark_paid(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<MarkPaidRequest>,
) -> ApiResult<AdminOrderView> {
    let order = state
        .services
        .orders
        .mark_payment_completed(&order_id, request.capture_details)
        .await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

/// One-click "service delivered". Repeating it re-stamps `completed_at`.
#[utoipa::path(
    post,
    path = "/admin/orders/{order_id}/complete",
    params(("order_id" = String, Path, description = "Business key")),
    responses(
        (status = 200, description = "Order completed", body = ApiResponse<AdminOrderView>),
        (status = 400, description = "Order is cancelled"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "No such order")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn mark_completed(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> ApiResult<AdminOrderView> {
    let order = state.services.orders.mark_order_completed(&order_id).await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

/// Direct status edit, still subject to the transition table.
#[utoipa::path(
    put,
    path = "/admin/orders/{order_id}/status",
    params(("order_id" = String, Path, description = "Business key")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<AdminOrderView>),
        (status = 400, description = "Transition not permitted"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "No such order")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn update_status(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<AdminOrderView> {
    if request.order_status.is_none() && request.payment_status.is_none() {
        return Err(ServiceError::ValidationError(
            "Provide order_status and/or payment_status".to_string(),
        ));
    }
    let update = UpdateOrder {
        order_status: request.order_status,
        payment_status: request.payment_status,
        ..Default::default()
    };
    let order = state.services.orders.update(&order_id, update).await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

#[utoipa::path(
    put,
    path = "/admin/orders/{order_id}/notes",
    params(("order_id" = String, Path, description = "Business key")),
    request_body = UpdateNotesRequest,
    responses(
        (status = 200, description = "Notes updated", body = ApiResponse<AdminOrderView>),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "No such order")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn update_notes(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateNotesRequest>,
) -> ApiResult<AdminOrderView> {
    let update = UpdateOrder {
        admin_notes: Some(request.admin_notes),
        ..Default::default()
    };
    let order = state.services.orders.update(&order_id, update).await?;
    Ok(Json(ApiResponse::success(OrderService::to_view(order))))
}

#[utoipa::path(
    get,
    path = "/admin/orders/search",
    params(("q" = String, Query, description = "Substring filter")),
    responses(
        (status = 200, description = "Matching orders, newest first", body = ApiResponse<Vec<AdminOrderView>>),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn search_orders(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<AdminOrderView>> {
    let orders = state.services.orders.search(query.q.trim()).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/admin/orders/by-customer",
    params(("email" = String, Query, description = "Customer email, case-insensitive")),
    responses(
        (status = 200, description = "Customer's orders, newest first", body = ApiResponse<Vec<AdminOrderView>>),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn orders_by_customer(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Vec<AdminOrderView>> {
    let orders = state.services.orders.list_by_customer(&query.email).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/admin/orders/by-status/{status}",
    params(("status" = String, Path, description = "Fulfillment state label, e.g. Processing")),
    responses(
        (status = 200, description = "Orders in that state, newest first", body = ApiResponse<Vec<AdminOrderView>>),
        (status = 400, description = "Unknown status label"),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn orders_by_status(
    _auth: AdminAuth,
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Vec<AdminOrderView>> {
    let status = OrderStatus::from_str(&status)
        .map_err(|_| ServiceError::ValidationError(format!("Unknown order status: {status}")))?;
    let orders = state.services.orders.list_by_status(status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/admin/orders/stats",
    responses(
        (status = 200, description = "Dashboard aggregates", body = ApiResponse<OrderStats>),
        (status = 401, description = "Missing or invalid admin token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn order_stats(
    _auth: AdminAuth,
    State(state): State<AppState>,
) -> ApiResult<OrderStats> {
    let stats = state.services.orders.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}
