// Each integration test binary links this module and uses a subset of it.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use gameboost_api::{app_router, config::AppConfig, db, AppState};

pub const ADMIN_KEY: &str = "test-admin-key-0123456789abcdef-0123456789";

/// In-process application over a private in-memory database. Requests go
/// through the full router, middleware included, via `oneshot`.
pub struct TestApp {
    pub router: Router,
}

fn test_config(paypal_base_url: Option<String>) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "debug".into(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        admin_api_key: ADMIN_KEY.into(),
        paypal_client_id: "test-client".into(),
        paypal_client_secret: "test-secret".into(),
        paypal_environment: "sandbox".into(),
        paypal_base_url,
        paypal_timeout_secs: 5,
        // A single connection keeps the in-memory database shared across
        // all queries in this app instance.
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        event_channel_capacity: 16,
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_paypal(None).await
    }

    /// Builds the app with the processor base URL pointed at a mock server.
    pub async fn spawn_with_paypal(paypal_base_url: Option<String>) -> Self {
        let config = test_config(paypal_base_url);
        let pool = db::establish_connection_from_app_config(&config)
            .await
            .expect("test database should connect");
        db::ensure_schema(&pool)
            .await
            .expect("test schema should apply");

        let state = AppState::new(Arc::new(pool), config, None).expect("test state should build");
        Self {
            router: app_router(state),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should answer");
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body), None).await
    }

    pub async fn post_admin(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body), Some(ADMIN_KEY))
            .await
    }

    pub async fn put_admin(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(body), Some(ADMIN_KEY))
            .await
    }

    pub async fn get_admin(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None, Some(ADMIN_KEY)).await
    }
}

/// Reads a money field that serializes as a decimal string. Compared
/// numerically because SQLite does not preserve decimal scale.
pub fn money(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.as_f64().unwrap(),
        other => panic!("not a money value: {other}"),
    }
}

/// Minimal valid order draft for creation tests. `amount` is passed as the
/// decimal string the wire format uses.
pub fn order_draft(customer: &str, amount: &str) -> Value {
    serde_json::json!({
        "customer_name": customer,
        "customer_email": format!("{}@example.com", customer.to_lowercase()),
        "service": "PC Money Boost",
        "amount": amount,
        "platform": "PC",
        "service_type": "money",
        "delivery_speed": "Standard",
        "gta_account_email": "acct@example.com",
        "gta_account_password": "hunter2",
        "gta_account_credits": 50
    })
}
