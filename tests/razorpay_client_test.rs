//! Wire-level tests for the Razorpay REST client against a mock server.
//!
//! Tests cover:
//! - Request paths, basic auth, and body shapes for all four calls
//! - Response decoding into gateway types
//! - Error envelope and non-JSON failure mapping

use haat_api::config::RazorpayConfig;
use haat_api::errors::ServiceError;
use haat_api::gateway::{
    CreateGatewayOrder, OrderNotes, PaymentGateway, RazorpayClient, TransferInstruction,
    TransferNotes,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("rzp_test_wiremock:wiremock_secret")
const BASIC_AUTH: &str = "Basic cnpwX3Rlc3Rfd2lyZW1vY2s6d2lyZW1vY2tfc2VjcmV0";

fn client_for(server: &MockServer) -> RazorpayClient {
    let config = RazorpayConfig {
        key_id: "rzp_test_wiremock".to_string(),
        key_secret: "wiremock_secret".to_string(),
        webhook_secret: "unused".to_string(),
        base_url: server.uri(),
        auto_capture: true,
        split_on_create: false,
    };
    RazorpayClient::new(&config).expect("build razorpay client")
}

fn order_request(amount_paise: i64) -> CreateGatewayOrder {
    CreateGatewayOrder {
        amount_paise,
        currency: "INR".to_string(),
        receipt: "HAAT-20260825-A1B2C3".to_string(),
        notes: OrderNotes {
            order_id: Uuid::nil(),
            customer_id: Uuid::nil(),
        },
        transfers: Vec::new(),
    }
}

#[tokio::test]
async fn test_create_order_posts_to_v1_orders_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({
            "amount": 146_600,
            "currency": "INR",
            "receipt": "HAAT-20260825-A1B2C3"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_N0yz123456",
            "amount": 146_600,
            "currency": "INR",
            "status": "created",
            "receipt": "HAAT-20260825-A1B2C3"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = client_for(&server)
        .create_order(order_request(146_600))
        .await
        .expect("order creation should succeed");

    assert_eq!(order.id, "order_N0yz123456");
    assert_eq!(order.amount_paise, 146_600);
    assert_eq!(order.currency, "INR");
    assert_eq!(order.status, "created");
}

#[tokio::test]
async fn test_create_order_sends_route_transfers() {
    let server = MockServer::start().await;
    let seller_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(body_partial_json(json!({
            "transfers": [{
                "account": "acc_bhujodi",
                "amount": 95_000,
                "currency": "INR"
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_routed01",
            "amount": 100_000,
            "currency": "INR",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = order_request(100_000);
    request.transfers = vec![TransferInstruction {
        account: "acc_bhujodi".to_string(),
        amount_paise: 95_000,
        currency: "INR".to_string(),
        notes: TransferNotes {
            seller_id,
            seller_name: "Bhujodi Weaves".to_string(),
            order_id: Some(Uuid::nil()),
            payout_id: None,
        },
    }];

    let order = client_for(&server)
        .create_order(request)
        .await
        .expect("routed order creation should succeed");
    assert_eq!(order.id, "order_routed01");
}

#[tokio::test]
async fn test_capture_posts_to_the_payment_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/pay_Abc123/capture"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({ "amount": 146_600, "currency": "INR" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pay_Abc123",
            "order_id": "order_N0yz123456",
            "amount": 146_600,
            "status": "captured"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payment = client_for(&server)
        .capture_payment("pay_Abc123", 146_600, "INR")
        .await
        .expect("capture should succeed");

    assert_eq!(payment.id, "pay_Abc123");
    assert_eq!(payment.order_id.as_deref(), Some("order_N0yz123456"));
    assert_eq!(payment.amount_paise, 146_600);
    assert_eq!(payment.status, "captured");
}

#[tokio::test]
async fn test_transfer_posts_to_v1_transfers() {
    let server = MockServer::start().await;
    let seller_id = Uuid::new_v4();
    let payout_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .and(body_partial_json(json!({
            "account": "acc_bhujodi",
            "amount": 113_500,
            "currency": "INR",
            "notes": { "seller_id": seller_id, "payout_id": payout_id }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "trf_Xyz789",
            "recipient": "acc_bhujodi",
            "amount": 113_500,
            "status": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transfer = client_for(&server)
        .transfer(TransferInstruction {
            account: "acc_bhujodi".to_string(),
            amount_paise: 113_500,
            currency: "INR".to_string(),
            notes: TransferNotes {
                seller_id,
                seller_name: "Bhujodi Weaves".to_string(),
                order_id: None,
                payout_id: Some(payout_id),
            },
        })
        .await
        .expect("transfer should succeed");

    assert_eq!(transfer.id, "trf_Xyz789");
    assert_eq!(transfer.recipient, "acc_bhujodi");
    assert_eq!(transfer.amount_paise, 113_500);
    assert_eq!(transfer.status, "created", "A null status falls back to created");
}

#[tokio::test]
async fn test_refund_posts_the_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments/pay_Abc123/refund"))
        .and(body_partial_json(json!({ "amount": 50_000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "rfnd_Def456",
            "payment_id": "pay_Abc123",
            "amount": 50_000,
            "status": "processed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refund = client_for(&server)
        .refund_payment("pay_Abc123", 50_000)
        .await
        .expect("refund should succeed");

    assert_eq!(refund.id, "rfnd_Def456");
    assert_eq!(refund.payment_id, "pay_Abc123");
    assert_eq!(refund.amount_paise, 50_000);
}

#[tokio::test]
async fn test_gateway_error_description_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "BAD_REQUEST_ERROR",
                "description": "Order amount less than minimum amount allowed"
            }
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_order(order_request(50))
        .await
        .expect_err("a 400 must map to an error");

    match err {
        ServiceError::GatewayError(detail) => {
            assert!(
                detail.contains("less than minimum"),
                "Razorpay's description should be preserved, got: {}",
                detail
            );
        }
        other => panic!("expected GatewayError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_failure_maps_to_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .transfer(TransferInstruction {
            account: "acc_bhujodi".to_string(),
            amount_paise: 1_000,
            currency: "INR".to_string(),
            notes: TransferNotes {
                seller_id: Uuid::new_v4(),
                seller_name: "Bhujodi Weaves".to_string(),
                order_id: None,
                payout_id: None,
            },
        })
        .await
        .expect_err("a 503 must map to an error");

    match err {
        ServiceError::GatewayError(detail) => {
            assert!(detail.contains("503"), "Got: {}", detail);
        }
        other => panic!("expected GatewayError, got {:?}", other),
    }
}
