mod common;

use http::{Method, StatusCode};
use serde_json::json;

use common::{money, order_draft, TestApp, ADMIN_KEY};

#[tokio::test]
async fn create_order_issues_business_key_and_pending_pair() {
    let app = TestApp::spawn().await;

    let (status, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    assert_eq!(status, StatusCode::OK);

    let order = &body["data"];
    let order_id = order["order_id"].as_str().unwrap();
    assert!(order_id.starts_with("GB-"));
    assert_eq!(order_id.len(), 15);
    assert_eq!(order["payment_status"], "Pending");
    assert_eq!(order["order_status"], "Pending");
    assert_eq!(money(&order["amount"]), 8.00);
    assert!(order["completed_at"].is_null());
    // The fulfillment-account password never crosses the read surface.
    assert!(order.get("gta_account_password").is_none());
}

#[tokio::test]
async fn create_order_rejects_missing_required_fields() {
    let app = TestApp::spawn().await;

    let mut draft = order_draft("Alex", "8.00");
    draft["customer_name"] = json!("");
    let (status, body) = app.post("/orders", draft).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Customer name is required"));
}

#[tokio::test]
async fn unknown_order_is_404() {
    let app = TestApp::spawn().await;
    let (status, _) = app.get("/orders/GB-DOESNOTEXIST").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn submit_body(items: serde_json::Value) -> serde_json::Value {
    json!({
        "cart": { "items": items },
        "checkout": {
            "customer_name": "Alex",
            "customer_email": "alex@example.com",
            "gta_account_email": "acct@example.com",
            "gta_account_password": "hunter2"
        }
    })
}

fn cart_item(id: &str, price: &str, quantity: u32) -> serde_json::Value {
    json!({
        "id": id,
        "service": "PC Money Boost",
        "amount": 50,
        "price": price,
        "platform": "PC",
        "delivery_speed": "Standard",
        "delivery_cost": "0",
        "service_type": "money",
        "quantity": quantity
    })
}

#[tokio::test]
async fn submit_creates_one_pending_order_per_cart_line() {
    let app = TestApp::spawn().await;

    let body = submit_body(json!([
        cart_item("line-1", "4.99", 1),
        cart_item("line-2", "7.99", 2)
    ]));
    let (status, response) = app.post("/orders/submit", body).await;
    assert_eq!(status, StatusCode::OK);

    let order_ids: Vec<&str> = response["data"]["order_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(order_ids.len(), 2);
    assert_ne!(order_ids[0], order_ids[1]);
    assert_eq!(response["data"]["failed"].as_array().unwrap().len(), 0);

    for order_id in order_ids {
        let (status, body) = app.get(&format!("/orders/{order_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["payment_status"], "Pending");
        assert_eq!(body["data"]["order_status"], "Pending");
    }
}

#[tokio::test]
async fn submit_records_quantity_in_service_details() {
    let app = TestApp::spawn().await;

    let body = submit_body(json!([cart_item("line-1", "7.99", 3)]));
    let (_, response) = app.post("/orders/submit", body).await;
    let order_id = response["data"]["order_ids"][0].as_str().unwrap();

    let (_, body) = app.get(&format!("/orders/{order_id}")).await;
    assert_eq!(money(&body["data"]["amount"]), 7.99);
    assert_eq!(body["data"]["service_details"]["quantity"], 3);
    assert_eq!(body["data"]["service_details"]["cart_item_id"], "line-1");
}

#[tokio::test]
async fn submit_requires_complete_checkout_info() {
    let app = TestApp::spawn().await;

    let mut body = submit_body(json!([cart_item("line-1", "4.99", 1)]));
    body["checkout"]["gta_account_password"] = json!("");
    let (status, _) = app.post("/orders/submit", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/orders/submit", submit_body(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_reject_missing_or_bad_tokens() {
    let app = TestApp::spawn().await;
    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    let path = format!("/orders/{order_id}");
    let update = json!({ "admin_notes": "vip" });

    let (status, _) = app
        .request(Method::PUT, &path, Some(update.clone()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::PUT, &path, Some(update.clone()), Some("wrong-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::PUT, &path, Some(update), Some(ADMIN_KEY))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn mark_paid_then_complete_walks_the_lifecycle() {
    let app = TestApp::spawn().await;
    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post_admin(&format!("/admin/orders/{order_id}/mark-paid"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "Completed");
    assert_eq!(body["data"]["order_status"], "Processing");

    let (status, body) = app
        .post_admin(&format!("/admin/orders/{order_id}/complete"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_status"], "Completed");
    let first_completed_at =
        chrono::DateTime::parse_from_rfc3339(body["data"]["completed_at"].as_str().unwrap())
            .unwrap();

    // Repeating the one-click re-stamps the completion time.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let (status, body) = app
        .post_admin(&format!("/admin/orders/{order_id}/complete"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_status"], "Completed");
    let second_completed_at =
        chrono::DateTime::parse_from_rfc3339(body["data"]["completed_at"].as_str().unwrap())
            .unwrap();
    assert!(second_completed_at > first_completed_at);
}

#[tokio::test]
async fn completed_orders_cannot_be_reopened_or_cancelled() {
    let app = TestApp::spawn().await;
    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    app.post_admin(&format!("/admin/orders/{order_id}/mark-paid"), json!({}))
        .await;
    app.post_admin(&format!("/admin/orders/{order_id}/complete"), json!({}))
        .await;

    let (status, _) = app
        .put_admin(
            &format!("/admin/orders/{order_id}/status"),
            json!({ "order_status": "Pending" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put_admin(
            &format!("/admin/orders/{order_id}/status"),
            json!({ "order_status": "Cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancellation_is_allowed_from_any_active_state() {
    let app = TestApp::spawn().await;
    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    app.post_admin(&format!("/admin/orders/{order_id}/mark-paid"), json!({}))
        .await;

    let (status, body) = app
        .put_admin(
            &format!("/admin/orders/{order_id}/status"),
            json!({ "order_status": "Cancelled" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_status"], "Cancelled");
    assert!(body["data"]["completed_at"].is_null());
}

#[tokio::test]
async fn search_and_stats_reflect_stored_orders() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.post("/orders", order_draft("Alice", "4.99")).await;
    app.post("/orders", order_draft("Bob", "7.99")).await;
    let alice_id = alice["data"]["order_id"].as_str().unwrap().to_string();

    app.post_admin(&format!("/admin/orders/{alice_id}/mark-paid"), json!({}))
        .await;

    let (status, body) = app.get_admin("/admin/orders/search?q=alice").await;
    assert_eq!(status, StatusCode::OK);
    let matches = body["data"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["customer_name"], "Alice");

    let (status, body) = app.get_admin("/admin/orders/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["pending"], 1);
    assert_eq!(body["data"]["processing"], 1);
    // Revenue counts only payment-completed rows.
    assert_eq!(money(&body["data"]["total_revenue"]), 4.99);
}

#[tokio::test]
async fn orders_are_listable_by_customer_email() {
    let app = TestApp::spawn().await;
    app.post("/orders", order_draft("Alice", "4.99")).await;
    app.post("/orders", order_draft("Alice", "7.99")).await;
    app.post("/orders", order_draft("Bob", "9.99")).await;

    // Casing from the checkout form does not matter.
    let (status, body) = app
        .get_admin("/admin/orders/by-customer?email=ALICE@example.com")
        .await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders
        .iter()
        .all(|o| o["customer_email"] == "alice@example.com"));

    let (status, body) = app
        .get_admin("/admin/orders/by-customer?email=nobody@example.com")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn orders_are_listable_by_fulfillment_state() {
    let app = TestApp::spawn().await;
    let (_, paid) = app.post("/orders", order_draft("Alice", "4.99")).await;
    app.post("/orders", order_draft("Bob", "7.99")).await;
    let paid_id = paid["data"]["order_id"].as_str().unwrap().to_string();

    app.post_admin(&format!("/admin/orders/{paid_id}/mark-paid"), json!({}))
        .await;

    let (status, body) = app.get_admin("/admin/orders/by-status/Processing").await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], paid_id.as_str());

    let (status, body) = app.get_admin("/admin/orders/by-status/Pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.get_admin("/admin/orders/by-status/Shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_orders_is_newest_first_and_searchable() {
    let app = TestApp::spawn().await;
    app.post("/orders", order_draft("First", "4.99")).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    app.post("/orders", order_draft("Second", "7.99")).await;

    let (status, body) = app.get("/orders").await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["customer_name"], "Second");

    let (_, body) = app.get("/orders?search=first").await;
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["customer_name"], "First");
}

#[tokio::test]
async fn amount_is_not_patchable() {
    let app = TestApp::spawn().await;
    let (_, body) = app.post("/orders", order_draft("Alex", "8.00")).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    // Unknown fields are ignored by the partial-update body; the stored
    // amount is untouched.
    let (status, body) = app
        .put_admin(
            &format!("/orders/{order_id}"),
            json!({ "amount": "999.99", "admin_notes": "checked" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(money(&body["data"]["amount"]), 8.00);
    assert_eq!(body["data"]["admin_notes"], "checked");
}
