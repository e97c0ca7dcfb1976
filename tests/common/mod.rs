use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use haat_api::{
    auth::{issue_token, Role},
    config::{AppConfig, RazorpayConfig},
    db,
    entities::{product, seller},
    errors::ServiceError,
    events::{self, EventSender},
    gateway::{
        CreateGatewayOrder, GatewayOrder, GatewayPayment, GatewayRefund, GatewayTransfer,
        PaymentGateway, SignatureVerifier, TransferInstruction,
    },
    handlers::AppServices,
    AppState,
};

pub const TEST_JWT_SECRET: &str =
    "integration_test_jwt_secret_with_enough_length_and_entropy_q8w7e6r5t4y3";
pub const TEST_KEY_SECRET: &str = "test_razorpay_key_secret";
pub const TEST_WEBHOOK_SECRET: &str = "test_razorpay_webhook_secret";

/// Recording gateway double. Every call is captured so tests can assert on
/// what the services sent, and transfers can be switched to fail.
#[derive(Default)]
pub struct FakeGateway {
    seq: AtomicUsize,
    pub orders: Mutex<Vec<CreateGatewayOrder>>,
    pub captures: Mutex<Vec<(String, i64)>>,
    pub transfers: Mutex<Vec<TransferInstruction>>,
    pub refunds: Mutex<Vec<(String, i64)>>,
    pub fail_transfers: AtomicBool,
}

impl FakeGateway {
    fn next(&self) -> usize {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        request: CreateGatewayOrder,
    ) -> Result<GatewayOrder, ServiceError> {
        let id = format!("order_fake{:06}", self.next());
        let order = GatewayOrder {
            id,
            amount_paise: request.amount_paise,
            currency: request.currency.clone(),
            status: "created".to_string(),
        };
        self.orders.lock().unwrap().push(request);
        Ok(order)
    }

    async fn capture_payment(
        &self,
        payment_id: &str,
        amount_paise: i64,
        _currency: &str,
    ) -> Result<GatewayPayment, ServiceError> {
        self.captures
            .lock()
            .unwrap()
            .push((payment_id.to_string(), amount_paise));
        Ok(GatewayPayment {
            id: payment_id.to_string(),
            order_id: None,
            amount_paise,
            status: "captured".to_string(),
        })
    }

    async fn transfer(
        &self,
        instruction: TransferInstruction,
    ) -> Result<GatewayTransfer, ServiceError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError(
                "simulated transfer failure".to_string(),
            ));
        }
        let transfer = GatewayTransfer {
            id: format!("trf_fake{:06}", self.next()),
            recipient: instruction.account.clone(),
            amount_paise: instruction.amount_paise,
            status: "processed".to_string(),
        };
        self.transfers.lock().unwrap().push(instruction);
        Ok(transfer)
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount_paise: i64,
    ) -> Result<GatewayRefund, ServiceError> {
        self.refunds
            .lock()
            .unwrap()
            .push((payment_id.to_string(), amount_paise));
        Ok(GatewayRefund {
            id: format!("rfnd_fake{:06}", self.next()),
            payment_id: payment_id.to_string(),
            amount_paise,
            status: "processed".to_string(),
        })
    }
}

/// Helper harness spinning up the app against a private SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub customer_id: Uuid,
    customer_token: String,
    admin_token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    /// Construct a test application with default configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application, letting the caller adjust config knobs
    /// (platform fee, auto capture, payout fees) before services are built.
    pub async fn with_config(mutate: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("haat_test.db");

        let razorpay = RazorpayConfig {
            key_id: "rzp_test_integration".to_string(),
            key_secret: TEST_KEY_SECRET.to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            base_url: "https://api.razorpay.com".to_string(),
            auto_capture: true,
            split_on_create: false,
        };

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_JWT_SECRET.to_string(),
            razorpay,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        mutate(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(FakeGateway::default());
        let cfg_arc = Arc::new(cfg);

        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            gateway.clone() as Arc<dyn PaymentGateway>,
            cfg_arc.clone(),
        );

        let verifier = SignatureVerifier::new(TEST_KEY_SECRET, TEST_WEBHOOK_SECRET);

        let state = AppState {
            db: db_arc,
            config: cfg_arc,
            event_sender,
            services,
            verifier,
        };

        let router = Router::new()
            .nest("/api/v1", haat_api::api_v1_routes())
            .with_state(state.clone());

        let customer_id = Uuid::new_v4();
        let customer_token = issue_token(TEST_JWT_SECRET, customer_id, Role::Customer, 3_600)
            .expect("issue customer token");
        let admin_token = issue_token(TEST_JWT_SECRET, Uuid::new_v4(), Role::Admin, 3_600)
            .expect("issue admin token");

        Self {
            router,
            state,
            gateway,
            customer_id,
            customer_token,
            admin_token,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub fn customer_token(&self) -> &str {
        &self.customer_token
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for customer-authenticated JSON requests.
    pub async fn request_as_customer(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.customer_token()))
            .await
    }

    /// Convenience helper for admin-authenticated JSON requests.
    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.admin_token()))
            .await
    }

    /// Deliver a signed webhook body the way Razorpay would.
    pub async fn deliver_webhook(
        &self,
        body: &Value,
        event_id: Option<&str>,
    ) -> axum::response::Response {
        let raw = serde_json::to_vec(body).expect("serialize webhook body");
        let signature = webhook_signature(&raw);
        self.deliver_webhook_raw(raw, Some(&signature), event_id)
            .await
    }

    /// Deliver a raw webhook body with an arbitrary (or missing) signature.
    pub async fn deliver_webhook_raw(
        &self,
        raw: Vec<u8>,
        signature: Option<&str>,
        event_id: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/razorpay")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("x-razorpay-signature", signature);
        }
        if let Some(id) = event_id {
            builder = builder.header("x-razorpay-event-id", id);
        }

        let request = builder.body(Body::from(raw)).expect("build webhook request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook delivery")
    }

    /// Sign a checkout callback the way Razorpay's widget would.
    pub fn payment_signature(&self, razorpay_order_id: &str, razorpay_payment_id: &str) -> String {
        self.state
            .verifier
            .payment_signature(razorpay_order_id, razorpay_payment_id)
    }

    pub async fn seed_seller(&self, name: &str, route_account: Option<&str>) -> seller::Model {
        let now = Utc::now();
        seller::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(format!(
                "{}@sellers.test",
                name.to_lowercase().replace(' ', ".")
            )),
            phone: Set(None),
            region: Set(Some("Kutch".to_string())),
            razorpay_account_id: Set(route_account.map(str::to_string)),
            platform_fee_percent: Set(None),
            payout_frequency: Set(seller::PayoutFrequency::Weekly),
            min_payout_paise: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed seller")
    }

    pub async fn seed_product(
        &self,
        seller_id: Uuid,
        name: &str,
        price_paise: i64,
        stock_quantity: i32,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            name: Set(name.to_string()),
            description: Set(None),
            category: Set(Some("handicraft".to_string())),
            image_url: Set(None),
            price_paise: Set(price_paise),
            stock_quantity: Set(stock_quantity),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Sign a webhook body with the shared test webhook secret.
pub fn webhook_signature(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Collect a response body into JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
