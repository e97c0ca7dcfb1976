use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Marketplace order. Every amount is stored in paise, and the gateway
/// identifiers fill in as the payment moves through its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub subtotal_paise: i64,
    pub tax_paise: i64,
    pub shipping_fee_paise: i64,
    pub discount_paise: i64,
    pub total_paise: i64,
    pub currency: String,
    #[sea_orm(nullable)]
    pub razorpay_order_id: Option<String>,
    #[sea_orm(nullable)]
    pub razorpay_payment_id: Option<String>,
    #[sea_orm(nullable)]
    pub razorpay_signature: Option<String>,
    /// True when per-seller transfers were attached to the gateway order at
    /// creation time; settlement must not transfer those amounts again.
    pub routed_at_source: bool,
    #[sea_orm(nullable)]
    pub payment_captured_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub refund_id: Option<String>,
    #[sea_orm(nullable)]
    pub refunded_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub idempotency_key: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub shipping_address: Option<Json>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order payment lifecycle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Awaiting payment; the gateway order exists but nothing was captured
    #[sea_orm(string_value = "created")]
    Created,
    /// Signature verified and payment captured
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Delivered to the customer; set by back-office tooling, not this API
    #[sea_orm(string_value = "fulfilled")]
    Fulfilled,
    /// Payment attempt failed or signature did not verify
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Cancelled by the customer before payment
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Captured payment returned to the customer
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    /// Cancellation is only allowed while nothing has been captured.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Refunds require a captured payment, which paid and fulfilled
    /// orders both hold.
    pub fn can_refund(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Fulfilled)
    }
}
