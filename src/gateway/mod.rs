//! Payment gateway abstraction.
//!
//! Services depend on the [`PaymentGateway`] trait rather than a concrete
//! client, so checkout and settlement can be exercised against a test double
//! while production wires in [`RazorpayClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

pub mod razorpay;
pub mod signature;

pub use razorpay::RazorpayClient;
pub use signature::SignatureVerifier;

/// Structured notes attached to gateway orders. Razorpay echoes these back
/// on payment objects and webhooks, which is how a webhook finds its order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNotes {
    pub order_id: Uuid,
    pub customer_id: Uuid,
}

/// Typed notes stamped onto every transfer so a row in the Razorpay
/// dashboard can be traced back to the seller and the order or payout that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferNotes {
    pub seller_id: Uuid,
    pub seller_name: String,
    /// Set when the transfer was attached to a gateway order at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    /// Set when the transfer settles a payout batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<Uuid>,
}

/// Instruction to route part of a payment to a seller's linked account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
    /// Linked account id ("acc_...")
    pub account: String,
    pub amount_paise: i64,
    pub currency: String,
    pub notes: TransferNotes,
}

/// Request to open an order on the gateway before collecting payment.
#[derive(Debug, Clone)]
pub struct CreateGatewayOrder {
    pub amount_paise: i64,
    pub currency: String,
    /// Merchant-side reference, our order number
    pub receipt: String,
    pub notes: OrderNotes,
    /// Route splits to attach at creation time; empty means no routing
    pub transfers: Vec<TransferInstruction>,
}

/// Gateway order as returned by the provider.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_paise: i64,
    pub currency: String,
    pub status: String,
}

/// Captured (or authorized) payment.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub id: String,
    pub order_id: Option<String>,
    pub amount_paise: i64,
    pub status: String,
}

/// Completed transfer to a linked account.
#[derive(Debug, Clone)]
pub struct GatewayTransfer {
    pub id: String,
    pub recipient: String,
    pub amount_paise: i64,
    pub status: String,
}

/// Refund issued against a captured payment.
#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount_paise: i64,
    pub status: String,
}

/// Operations the marketplace needs from its payment provider.
///
/// Every amount crossing this boundary is in paise. Implementations make a
/// single attempt per call; retry policy belongs to the caller, which knows
/// whether the surrounding state transition is safe to repeat.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a gateway order for the given amount, optionally attaching
    /// Route transfer splits.
    async fn create_order(&self, request: CreateGatewayOrder)
        -> Result<GatewayOrder, ServiceError>;

    /// Captures a previously authorized payment for the exact amount.
    async fn capture_payment(
        &self,
        payment_id: &str,
        amount_paise: i64,
        currency: &str,
    ) -> Result<GatewayPayment, ServiceError>;

    /// Moves funds from the platform balance to a seller's linked account.
    async fn transfer(
        &self,
        instruction: TransferInstruction,
    ) -> Result<GatewayTransfer, ServiceError>;

    /// Refunds a captured payment in full or in part.
    async fn refund_payment(
        &self,
        payment_id: &str,
        amount_paise: i64,
    ) -> Result<GatewayRefund, ServiceError>;
}
