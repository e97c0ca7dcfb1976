//! End-to-end checkout tests: cart to priced order to captured payment.
//!
//! Tests cover:
//! - Server-side pricing, tax, shipping, and commission splits
//! - Idempotent order creation
//! - Route transfers in split-on-create mode
//! - Payment signature verification and stock decrement
//! - Order listing, cancellation, and refunds

mod common;

use axum::http::Method;
use common::{read_json, TestApp, TEST_JWT_SECRET};
use haat_api::auth::{issue_token, Role};
use haat_api::entities::product::{self, Entity as Product};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use uuid::Uuid;

fn shipping_address() -> Value {
    json!({
        "name": "Meera Joshi",
        "line1": "12 Station Road",
        "city": "Bhuj",
        "state": "Gujarat",
        "pincode": "370001"
    })
}

fn checkout_payload(idempotency_key: Option<&str>) -> Value {
    let mut payload = json!({ "shipping_address": shipping_address() });
    if let Some(key) = idempotency_key {
        payload["idempotency_key"] = json!(key);
    }
    payload
}

/// Seed one seller with one product and put `quantity` of it in the cart.
async fn fill_cart(app: &TestApp, price_paise: i64, stock: i32, quantity: i32) -> product::Model {
    let seller = app.seed_seller("Bhujodi Weaves", None).await;
    let stole = app.seed_product(seller.id, "Kala cotton stole", price_paise, stock).await;
    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": stole.id, "quantity": quantity })),
        )
        .await;
    assert_eq!(response.status(), 200, "Cart seeding should succeed");
    stole
}

async fn create_order(app: &TestApp, key: Option<&str>) -> Value {
    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/create-order",
            Some(checkout_payload(key)),
        )
        .await;
    assert_eq!(response.status(), 201, "Order creation should succeed");
    read_json(response).await
}

async fn verify_payment(app: &TestApp, checkout: &Value, payment_id: &str) -> Value {
    let rzp_order = checkout["data"]["razorpay_order_id"].as_str().unwrap();
    let signature = app.payment_signature(rzp_order, payment_id);
    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/verify",
            Some(json!({
                "razorpay_order_id": rzp_order,
                "razorpay_payment_id": payment_id,
                "razorpay_signature": signature
            })),
        )
        .await;
    assert_eq!(response.status(), 200, "Verification request should succeed");
    read_json(response).await
}

// ==================== Order Creation Tests ====================

#[tokio::test]
async fn test_checkout_prices_the_cart_server_side() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;

    let body = create_order(&app, None).await;
    assert!(body["success"].as_bool().unwrap_or(false));

    let data = &body["data"];
    let order = &data["order"]["order"];
    assert_eq!(order["subtotal_paise"], 120_000);
    assert_eq!(order["tax_paise"], 21_600, "Tax should be 18% of the subtotal");
    assert_eq!(order["shipping_fee_paise"], 5_000);
    assert_eq!(order["discount_paise"], 0);
    assert_eq!(order["total_paise"], 146_600);
    assert_eq!(order["currency"], "INR");
    assert_eq!(order["status"], "created");
    assert!(
        order["order_number"].as_str().unwrap().starts_with("HAAT-"),
        "Order numbers carry the marketplace prefix"
    );

    let items = data["order"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["line_total_paise"], 120_000);
    assert_eq!(items[0]["platform_fee_paise"], 6_000, "Commission should be 5%");
    assert_eq!(items[0]["seller_share_paise"], 114_000);

    assert_eq!(data["razorpay_order_id"], "order_fake000001");
    assert_eq!(data["amount_paise"], 146_600);
    assert_eq!(data["razorpay_key_id"], "rzp_test_integration");
    assert_eq!(data["idempotent_replay"], false);

    let gateway_orders = app.gateway.orders.lock().unwrap();
    assert_eq!(gateway_orders.len(), 1);
    assert_eq!(gateway_orders[0].amount_paise, 146_600);
    assert_eq!(gateway_orders[0].receipt, order["order_number"]);
    assert!(
        gateway_orders[0].transfers.is_empty(),
        "No Route transfers outside split-on-create mode"
    );
}

#[tokio::test]
async fn test_checkout_converts_the_cart() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    create_order(&app, None).await;

    let cart = read_json(app.request_as_customer(Method::GET, "/api/v1/cart", None).await).await;
    assert_eq!(
        cart["data"]["items"].as_array().map(Vec::len),
        Some(0),
        "Checkout should leave the customer with a fresh empty cart"
    );
}

#[tokio::test]
async fn test_checkout_with_empty_cart_fails() {
    let app = TestApp::new().await;

    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/create-order",
            Some(checkout_payload(None)),
        )
        .await;
    assert_eq!(response.status(), 400);

    let body = read_json(response).await;
    assert!(
        body["message"].as_str().unwrap_or_default().contains("empty"),
        "Error should say the cart is empty, got: {}",
        body["message"]
    );
}

#[tokio::test]
async fn test_checkout_reprices_from_the_catalog() {
    let app = TestApp::new().await;
    let stole = fill_cart(&app, 45_000, 10, 2).await;

    // Price change after the item went into the cart
    let mut repriced: product::ActiveModel = stole.into();
    repriced.price_paise = Set(50_000);
    repriced.update(&*app.state.db).await.expect("reprice product");

    let body = create_order(&app, None).await;
    let order = &body["data"]["order"]["order"];
    assert_eq!(
        order["subtotal_paise"], 100_000,
        "Checkout must use the current catalog price, not the cart snapshot"
    );
}

#[tokio::test]
async fn test_checkout_fails_when_stock_ran_out() {
    let app = TestApp::new().await;
    let stole = fill_cart(&app, 45_000, 10, 3).await;

    let mut depleted: product::ActiveModel = stole.into();
    depleted.stock_quantity = Set(1);
    depleted.update(&*app.state.db).await.expect("deplete stock");

    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/create-order",
            Some(checkout_payload(None)),
        )
        .await;
    assert_eq!(response.status(), 422);
    assert_eq!(app.gateway.order_count(), 0, "The gateway must not be called");
}

#[tokio::test]
async fn test_idempotency_key_replays_the_original_order() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;

    let first = create_order(&app, Some("chk_7f3a")).await;
    let first_id = first["data"]["order"]["order"]["id"].clone();

    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/create-order",
            Some(checkout_payload(Some("chk_7f3a"))),
        )
        .await;
    assert_eq!(response.status(), 200, "A replay should come back as 200, not 201");

    let replay = read_json(response).await;
    assert_eq!(replay["data"]["idempotent_replay"], true);
    assert_eq!(replay["data"]["order"]["order"]["id"], first_id);
    assert_eq!(
        app.gateway.order_count(),
        1,
        "The gateway order must not be created twice"
    );
}

#[tokio::test]
async fn test_split_on_create_attaches_route_transfers() {
    let app = TestApp::with_config(|cfg| cfg.razorpay.split_on_create = true).await;
    let seller = app.seed_seller("Bhujodi Weaves", Some("acc_bhujodi")).await;
    let stole = app.seed_product(seller.id, "Kala cotton stole", 120_000, 5).await;
    app.request_as_customer(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": stole.id, "quantity": 1 })),
    )
    .await;

    let body = create_order(&app, None).await;
    assert_eq!(body["data"]["order"]["order"]["routed_at_source"], true);

    let gateway_orders = app.gateway.orders.lock().unwrap();
    let transfers = &gateway_orders[0].transfers;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].account, "acc_bhujodi");
    assert_eq!(
        transfers[0].amount_paise, 114_000,
        "Transfer carries the seller share net of commission"
    );
    assert_eq!(transfers[0].notes.seller_id, seller.id);
    assert!(transfers[0].notes.order_id.is_some());
    assert!(transfers[0].notes.payout_id.is_none());
}

#[tokio::test]
async fn test_split_on_create_falls_back_without_linked_accounts() {
    let app = TestApp::with_config(|cfg| cfg.razorpay.split_on_create = true).await;
    let linked = app.seed_seller("Bhujodi Weaves", Some("acc_bhujodi")).await;
    let unlinked = app.seed_seller("Khavda Pottery", None).await;
    let stole = app.seed_product(linked.id, "Kala cotton stole", 120_000, 5).await;
    let lamp = app.seed_product(unlinked.id, "Terracotta lamp", 30_000, 5).await;
    for product_id in [stole.id, lamp.id] {
        app.request_as_customer(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product_id, "quantity": 1 })),
        )
        .await;
    }

    let body = create_order(&app, None).await;
    assert_eq!(
        body["data"]["order"]["order"]["routed_at_source"], false,
        "One unlinked seller pushes the whole order to scheduled settlement"
    );
    assert!(app.gateway.orders.lock().unwrap()[0].transfers.is_empty());
}

// ==================== Payment Verification Tests ====================

#[tokio::test]
async fn test_verify_marks_the_order_paid_and_decrements_stock() {
    let app = TestApp::new().await;
    let stole = fill_cart(&app, 120_000, 5, 2).await;
    let checkout = create_order(&app, None).await;

    let body = verify_payment(&app, &checkout, "pay_flow000001").await;
    assert_eq!(body["data"]["verified"], true);
    assert_eq!(body["data"]["order"]["status"], "paid");
    assert_eq!(body["data"]["order"]["razorpay_payment_id"], "pay_flow000001");
    assert!(body["data"]["order"]["payment_captured_at"].is_string());

    let fresh = Product::find_by_id(stole.id)
        .one(&*app.state.db)
        .await
        .expect("query product")
        .expect("product still exists");
    assert_eq!(fresh.stock_quantity, 3, "Stock should drop by the ordered quantity");

    assert!(
        app.gateway.captures.lock().unwrap().is_empty(),
        "Auto-capture mode never calls capture"
    );
}

#[tokio::test]
async fn test_verify_rejects_a_forged_signature() {
    let app = TestApp::new().await;
    let stole = fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    let rzp_order = checkout["data"]["razorpay_order_id"].as_str().unwrap();

    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/verify",
            Some(json!({
                "razorpay_order_id": rzp_order,
                "razorpay_payment_id": "pay_flow000001",
                "razorpay_signature": "deadbeef"
            })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = read_json(response).await;
    assert_eq!(body["data"]["verified"], false);
    assert_eq!(
        body["data"]["order"]["status"], "created",
        "A mismatch must leave the order unpaid"
    );

    let fresh = Product::find_by_id(stole.id)
        .one(&*app.state.db)
        .await
        .expect("query product")
        .expect("product still exists");
    assert_eq!(fresh.stock_quantity, 5, "Stock must not move on a forged signature");
}

#[tokio::test]
async fn test_verify_same_payment_twice_is_idempotent() {
    let app = TestApp::new().await;
    let stole = fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;

    verify_payment(&app, &checkout, "pay_flow000001").await;
    let second = verify_payment(&app, &checkout, "pay_flow000001").await;
    assert_eq!(second["data"]["verified"], true);

    let fresh = Product::find_by_id(stole.id)
        .one(&*app.state.db)
        .await
        .expect("query product")
        .expect("product still exists");
    assert_eq!(fresh.stock_quantity, 4, "Stock should only be decremented once");
}

#[tokio::test]
async fn test_verify_conflicting_payment_id_rejected() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    verify_payment(&app, &checkout, "pay_flow000001").await;

    let rzp_order = checkout["data"]["razorpay_order_id"].as_str().unwrap();
    let signature = app.payment_signature(rzp_order, "pay_flow000002");
    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/checkout/verify",
            Some(json!({
                "razorpay_order_id": rzp_order,
                "razorpay_payment_id": "pay_flow000002",
                "razorpay_signature": signature
            })),
        )
        .await;
    assert_eq!(response.status(), 409, "A second payment against a paid order conflicts");
}

#[tokio::test]
async fn test_verify_is_scoped_to_the_order_owner() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    let rzp_order = checkout["data"]["razorpay_order_id"].as_str().unwrap();
    let signature = app.payment_signature(rzp_order, "pay_flow000001");

    let intruder = issue_token(TEST_JWT_SECRET, Uuid::new_v4(), Role::Customer, 3_600)
        .expect("issue second customer token");
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout/verify",
            Some(json!({
                "razorpay_order_id": rzp_order,
                "razorpay_payment_id": "pay_flow000001",
                "razorpay_signature": signature
            })),
            Some(&intruder),
        )
        .await;
    assert_eq!(response.status(), 404, "Another customer cannot see the order");
}

#[tokio::test]
async fn test_manual_capture_mode_captures_through_the_gateway() {
    let app = TestApp::with_config(|cfg| cfg.razorpay.auto_capture = false).await;
    let seller = app.seed_seller("Bhujodi Weaves", None).await;
    let stole = app.seed_product(seller.id, "Kala cotton stole", 120_000, 5).await;
    app.request_as_customer(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": stole.id, "quantity": 1 })),
    )
    .await;
    let checkout = create_order(&app, None).await;

    let body = verify_payment(&app, &checkout, "pay_flow000001").await;
    assert_eq!(body["data"]["verified"], true);

    let captures = app.gateway.captures.lock().unwrap();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0], ("pay_flow000001".to_string(), 146_600));
}

// ==================== Order Listing Tests ====================

#[tokio::test]
async fn test_list_orders_paginates_newest_first() {
    let app = TestApp::new().await;
    let stole = fill_cart(&app, 120_000, 10, 1).await;
    create_order(&app, None).await;

    app.request_as_customer(
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": stole.id, "quantity": 2 })),
    )
    .await;
    let second = create_order(&app, None).await;
    let second_id = second["data"]["order"]["order"]["id"].clone();

    let response = app
        .request_as_customer(Method::GET, "/api/v1/checkout/orders?page=1&per_page=1", None)
        .await;
    assert_eq!(response.status(), 200);

    let data = read_json(response).await["data"].clone();
    assert_eq!(data["total"], 2);
    assert_eq!(data["page"], 1);
    assert_eq!(data["per_page"], 1);
    assert_eq!(data["total_pages"], 2);
    let items = data["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], second_id, "Newest order should come first");
}

#[tokio::test]
async fn test_get_order_returns_its_lines() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();

    let response = app
        .request_as_customer(Method::GET, &format!("/api/v1/checkout/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), 200);

    let data = read_json(response).await["data"].clone();
    assert_eq!(data["order"]["id"].as_str(), Some(order_id.as_str()));
    assert_eq!(data["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(data["items"][0]["product_name"], "Kala cotton stole");
}

#[tokio::test]
async fn test_get_order_of_another_customer_is_hidden() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();

    let intruder = issue_token(TEST_JWT_SECRET, Uuid::new_v4(), Role::Customer, 3_600)
        .expect("issue second customer token");
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/checkout/orders/{}", order_id),
            None,
            Some(&intruder),
        )
        .await;
    assert_eq!(response.status(), 404);
}

// ==================== Cancel and Refund Tests ====================

#[tokio::test]
async fn test_cancel_an_unpaid_order() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();

    let response = app
        .request_as_customer(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/cancel", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(read_json(response).await["data"]["status"], "cancelled");
}

#[tokio::test]
async fn test_cancel_a_paid_order_is_rejected() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    verify_payment(&app, &checkout, "pay_flow000001").await;

    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();
    let response = app
        .request_as_customer(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/cancel", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 400, "Paid orders must go through refund");
}

#[tokio::test]
async fn test_admin_refund_defaults_to_the_full_amount() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    verify_payment(&app, &checkout, "pay_flow000001").await;

    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();
    let response = app
        .request_as_admin(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/refund", order_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(response.status(), 200);

    let data = read_json(response).await["data"].clone();
    assert_eq!(data["status"], "refunded");
    assert!(data["refund_id"].as_str().unwrap().starts_with("rfnd_fake"));

    let refunds = app.gateway.refunds.lock().unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0], ("pay_flow000001".to_string(), 146_600));
}

#[tokio::test]
async fn test_partial_refund_amount_is_forwarded() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    verify_payment(&app, &checkout, "pay_flow000001").await;

    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();
    let response = app
        .request_as_admin(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/refund", order_id),
            Some(json!({ "amount_paise": 50_000, "reason": "One stole arrived damaged" })),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        app.gateway.refunds.lock().unwrap()[0],
        ("pay_flow000001".to_string(), 50_000)
    );
}

#[tokio::test]
async fn test_refund_requires_the_admin_role() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;
    verify_payment(&app, &checkout, "pay_flow000001").await;

    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();
    let response = app
        .request_as_customer(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/refund", order_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(response.status(), 403);
    assert!(app.gateway.refunds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_refund_without_a_captured_payment_is_rejected() {
    let app = TestApp::new().await;
    fill_cart(&app, 120_000, 5, 1).await;
    let checkout = create_order(&app, None).await;

    let order_id = checkout["data"]["order"]["order"]["id"].as_str().unwrap().to_string();
    let response = app
        .request_as_admin(
            Method::POST,
            &format!("/api/v1/checkout/orders/{}/refund", order_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(response.status(), 400);
}
