mod common;

use http::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{order_draft, TestApp};

async fn processor() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .mount(&server)
        .await;
    server
}

fn completed_order(id: &str, amount: &str) -> Value {
    json!({
        "id": id,
        "status": "COMPLETED",
        "purchase_units": [{
            "payments": { "captures": [{
                "id": "CAP-1",
                "status": "COMPLETED",
                "amount": { "currency_code": "USD", "value": amount },
                "seller_receivable_breakdown": {
                    "paypal_fee": { "currency_code": "USD", "value": "0.58" }
                }
            }]}
        }],
        "payer": { "email_address": "payer@example.com" }
    })
}

async fn mount_order(server: &MockServer, id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/checkout/orders/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn verify_requires_a_processor_order_id() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .post("/payment/verify", json!({ "paypal_order_id": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verify_settles_existing_orders_and_enriches_them() {
    let server = processor().await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    mount_order(&server, "PP-100", completed_order("PP-100", "8.00")).await;
    let (status, body) = app
        .post(
            "/payment/verify",
            json!({ "paypal_order_id": "PP-100", "order_ids": [order_id] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paypal_status"], "COMPLETED");
    assert_eq!(body["data"]["orders_updated"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["captures"][0]["capture_id"], "CAP-1");

    let order_id = body["data"]["orders_updated"][0].as_str().unwrap();
    let (_, body) = app.get(&format!("/orders/{order_id}")).await;
    let order = &body["data"];
    assert_eq!(order["payment_status"], "Completed");
    assert_eq!(order["order_status"], "Processing");
    assert_eq!(order["service_details"]["paypal_order_id"], "PP-100");
    assert_eq!(order["service_details"]["paypal_capture_id"], "CAP-1");
    assert_eq!(order["service_details"]["payment_method"], "PayPal");
    assert_eq!(order["service_details"]["paypal_amount"], "8.00");
    assert_eq!(order["service_details"]["paypal_transaction_fee"], "0.58");
    assert_eq!(
        order["service_details"]["paypal_payer_email"],
        "payer@example.com"
    );
}

#[tokio::test]
async fn verify_is_idempotent_for_replayed_captures() {
    let server = processor().await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();
    mount_order(&server, "PP-200", completed_order("PP-200", "8.00")).await;

    let request = json!({ "paypal_order_id": "PP-200", "order_ids": [order_id] });
    let (status, _) = app.post("/payment/verify", request.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get(&format!("/orders/{order_id}")).await;
    let first_completed_at = body["data"]["service_details"]["payment_completed_at"].clone();

    // The race partner replays the same capture. Statuses are already
    // terminal and the enrichment marker blocks a second merge.
    let (status, body) = app.post("/payment/verify", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["orders_updated"].as_array().unwrap().len(), 1);

    let (_, body) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(body["data"]["payment_status"], "Completed");
    assert_eq!(body["data"]["order_status"], "Processing");
    assert_eq!(
        body["data"]["service_details"]["payment_completed_at"],
        first_completed_at
    );
}

#[tokio::test]
async fn approved_but_uncaptured_payment_is_rejected() {
    let server = processor().await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    mount_order(
        &server,
        "PP-300",
        json!({ "id": "PP-300", "status": "APPROVED", "purchase_units": [] }),
    )
    .await;
    let (status, body) = app
        .post(
            "/payment/verify",
            json!({ "paypal_order_id": "PP-300", "order_ids": [order_id.clone()] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("APPROVED"));

    // Nothing local moved.
    let (_, body) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(body["data"]["payment_status"], "Pending");
    assert_eq!(body["data"]["order_status"], "Pending");
}

#[tokio::test]
async fn completed_order_without_captures_is_rejected() {
    let server = processor().await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    mount_order(
        &server,
        "PP-400",
        json!({
            "id": "PP-400",
            "status": "COMPLETED",
            "purchase_units": [{ "payments": { "captures": [
                { "id": "CAP-X", "status": "DECLINED",
                  "amount": { "currency_code": "USD", "value": "8.00" } }
            ]}}]
        }),
    )
    .await;
    let (status, _) = app
        .post(
            "/payment/verify",
            json!({ "paypal_order_id": "PP-400", "order_ids": ["GB-WHATEVER0001"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fallback_creates_paid_orders_from_the_cart_snapshot() {
    let server = processor().await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    mount_order(&server, "PP-500", completed_order("PP-500", "20.97")).await;
    let (status, body) = app
        .post(
            "/payment/verify",
            json!({
                "paypal_order_id": "PP-500",
                "cart": { "items": [
                    {
                        "id": "line-1",
                        "service": "PC Money Boost",
                        "price": "4.99",
                        "platform": "PC",
                        "delivery_speed": "Standard",
                        "service_type": "money",
                        "service_details": { "moneyAmount": 100 },
                        "quantity": 1
                    },
                    {
                        "id": "line-2",
                        "service": "Rank Boost",
                        "amount": 40,
                        "price": "7.99",
                        "platform": "Xbox",
                        "delivery_speed": "Express",
                        "service_type": "rank",
                        "quantity": 2
                    }
                ]},
                "checkout": {
                    "customer_name": "Alex",
                    "customer_email": "alex@example.com",
                    "gta_account_email": "acct@example.com",
                    "gta_account_password": "hunter2"
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let created = body["data"]["orders_created"].as_array().unwrap();
    assert_eq!(created.len(), 2);

    let (_, body) = app
        .get(&format!("/orders/{}", created[0].as_str().unwrap()))
        .await;
    let order = &body["data"];
    // Fallback orders are born already paid and in fulfillment.
    assert_eq!(order["payment_status"], "Completed");
    assert_eq!(order["order_status"], "Processing");
    assert_eq!(order["service_details"]["paypal_order_id"], "PP-500");

    let (_, body) = app
        .get(&format!("/orders/{}", created[1].as_str().unwrap()))
        .await;
    assert_eq!(body["data"]["gta_account_credits"], 40);
}

#[tokio::test]
async fn unreachable_processor_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    let (status, _) = app
        .post(
            "/payment/verify",
            json!({ "paypal_order_id": "PP-600", "order_ids": ["GB-AAAABBBBCCCC"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn capture_order_returns_the_finalized_record() {
    use gameboost_api::errors::ServiceError;
    use gameboost_api::services::paypal::PayPalClient;
    use std::time::Duration;

    let server = processor().await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/PP-800/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(completed_order("PP-800", "8.00")))
        .mount(&server)
        .await;

    let client = PayPalClient::from_parts(
        server.uri(),
        "test-client".into(),
        "test-secret".into(),
        Duration::from_secs(5),
    )
    .unwrap();

    let order = client.capture_order("PP-800").await.unwrap();
    assert!(order.is_completed());
    assert_eq!(order.completed_captures()[0].id, "CAP-1");

    // Without credentials nothing goes on the wire at all.
    let unconfigured =
        PayPalClient::from_parts(server.uri(), String::new(), String::new(), Duration::from_secs(5))
            .unwrap();
    assert!(matches!(
        unconfigured.capture_order("PP-800").await,
        Err(ServiceError::CredentialsMissing)
    ));
}

#[tokio::test]
async fn create_processor_order_validates_the_cart_first() {
    let server = processor().await;
    let app = TestApp::spawn_with_paypal(Some(server.uri())).await;

    // An empty cart never reaches the processor.
    let (status, _) = app
        .post("/payment/create-order", json!({ "cart": { "items": [] } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "PP-700",
            "status": "CREATED"
        })))
        .mount(&server)
        .await;
    let (status, body) = app
        .post(
            "/payment/create-order",
            json!({ "cart": { "items": [{
                "id": "line-1",
                "service": "PC Money Boost",
                "price": "4.99",
                "platform": "PC",
                "delivery_speed": "Standard",
                "service_type": "money",
                "quantity": 1
            }]}}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paypal_order_id"], "PP-700");
}
