//! GameBoost API Library
//!
//! Order lifecycle and payment reconciliation for a game-account boosting
//! storefront: cart submission, a PayPal-style capture client, and the
//! admin surface that keeps fulfillment honest.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod cart;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Option<EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: config::AppConfig,
        event_sender: Option<EventSender>,
    ) -> Result<Self, errors::ServiceError> {
        let services = AppServices::build(db.clone(), &config, event_sender.clone())?;
        Ok(Self {
            db,
            config,
            event_sender,
            services,
        })
    }
}

/// Envelope for successful JSON responses. Failures bypass this and go
/// through [`errors::ServiceError`]'s `IntoResponse`.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

/// Standard result type for JSON handlers.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = db::check_connection(&state.db).await.is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Routes only; no middleware. Tests compose this directly.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/submit", post(handlers::orders::submit_cart))
        .route(
            "/orders/:order_id",
            get(handlers::orders::get_order).put(handlers::orders::update_order),
        )
        .route(
            "/payment/create-order",
            post(handlers::payments::create_processor_order),
        )
        .route("/payment/verify", post(handlers::payments::verify_payment))
        .route(
            "/admin/orders/search",
            get(handlers::admin::search_orders),
        )
        .route("/admin/orders/stats", get(handlers::admin::order_stats))
        .route(
            "/admin/orders/by-customer",
            get(handlers::admin::orders_by_customer),
        )
        .route(
            "/admin/orders/by-status/:status",
            get(handlers::admin::orders_by_status),
        )
        .route(
            "/admin/orders/:order_id/mark-paid",
            post(handlers::admin::mark_paid),
        )
        .route(
            "/admin/orders/:order_id/complete",
            post(handlers::admin::mark_completed),
        )
        .route(
            "/admin/orders/:order_id/status",
            put(handlers::admin::update_status),
        )
        .route(
            "/admin/orders/:order_id/notes",
            put(handlers::admin::update_notes),
        )
}

/// Full application router: API routes, Swagger UI, and the middleware
/// stack, bound to state.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    api_routes()
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(
            header::HeaderName::from_static("x-request-id"),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(header::HeaderName::from_static(
            "x-request-id",
        )))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(state)
}
