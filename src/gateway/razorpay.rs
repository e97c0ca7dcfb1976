//! Razorpay REST client.
//!
//! Thin adapter over the v1 API: open orders (optionally with Route
//! transfers), capture payments, move funds to linked accounts, and refund.
//! Calls are made once with a 10 second timeout; any gateway-side failure
//! surfaces as [`ServiceError::GatewayError`] with Razorpay's description.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RazorpayConfig;
use crate::errors::ServiceError;

use super::{
    CreateGatewayOrder, GatewayOrder, GatewayPayment, GatewayRefund, GatewayTransfer,
    OrderNotes, PaymentGateway, TransferInstruction, TransferNotes,
};

#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("base_url", &self.base_url)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    pub fn new(config: &RazorpayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "Razorpay request");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .map(|env| env.error.description)
                .unwrap_or_else(|| status.to_string());
            warn!(%path, %status, %detail, "Razorpay call rejected");
            return Err(ServiceError::GatewayError(detail));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("malformed response from {}: {}", path, e)))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        request: CreateGatewayOrder,
    ) -> Result<GatewayOrder, ServiceError> {
        let body = CreateOrderBody {
            amount: request.amount_paise,
            currency: &request.currency,
            receipt: &request.receipt,
            notes: &request.notes,
            transfers: request
                .transfers
                .iter()
                .map(|t| TransferBody {
                    account: &t.account,
                    amount: t.amount_paise,
                    currency: &t.currency,
                    notes: &t.notes,
                })
                .collect(),
        };

        let order: OrderResponse = self.post("/v1/orders", &body).await?;
        Ok(GatewayOrder {
            id: order.id,
            amount_paise: order.amount,
            currency: order.currency,
            status: order.status,
        })
    }

    async fn capture_payment(
        &self,
        payment_id: &str,
        amount_paise: i64,
        currency: &str,
    ) -> Result<GatewayPayment, ServiceError> {
        let body = CaptureBody {
            amount: amount_paise,
            currency,
        };

        let payment: PaymentResponse = self
            .post(&format!("/v1/payments/{}/capture", payment_id), &body)
            .await?;
        Ok(GatewayPayment {
            id: payment.id,
            order_id: payment.order_id,
            amount_paise: payment.amount,
            status: payment.status,
        })
    }

    async fn transfer(
        &self,
        instruction: TransferInstruction,
    ) -> Result<GatewayTransfer, ServiceError> {
        let body = TransferBody {
            account: &instruction.account,
            amount: instruction.amount_paise,
            currency: &instruction.currency,
            notes: &instruction.notes,
        };

        let transfer: TransferResponse = self.post("/v1/transfers", &body).await?;
        Ok(GatewayTransfer {
            id: transfer.id,
            recipient: transfer.recipient,
            amount_paise: transfer.amount,
            status: transfer.status.unwrap_or_else(|| "created".to_string()),
        })
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount_paise: i64,
    ) -> Result<GatewayRefund, ServiceError> {
        let body = RefundBody {
            amount: amount_paise,
        };

        let refund: RefundResponse = self
            .post(&format!("/v1/payments/{}/refund", payment_id), &body)
            .await?;
        Ok(GatewayRefund {
            id: refund.id,
            payment_id: refund.payment_id,
            amount_paise: refund.amount,
            status: refund.status,
        })
    }
}

// Wire types. Amounts are paise on both sides, matching Razorpay's
// smallest-unit convention.

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a OrderNotes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    transfers: Vec<TransferBody<'a>>,
}

#[derive(Serialize)]
struct TransferBody<'a> {
    account: &'a str,
    amount: i64,
    currency: &'a str,
    notes: &'a TransferNotes,
}

#[derive(Serialize)]
struct CaptureBody<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Serialize)]
struct RefundBody {
    amount: i64,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: String,
    order_id: Option<String>,
    amount: i64,
    status: String,
}

#[derive(Deserialize)]
struct TransferResponse {
    id: String,
    recipient: String,
    amount: i64,
    status: Option<String>,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
    payment_id: String,
    amount: i64,
    status: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    description: String,
}
