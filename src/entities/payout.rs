use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Settlement batch owed to one seller for a window of captured orders.
///
/// `gross` is the sum of the claimed seller shares (platform fee already
/// deducted per line; the roll-up here is for reporting), so
/// `net = gross - processing_fee`, all in paise. The batch claims its order
/// items when created, so a failed transfer can be retried without ever
/// paying a line twice.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "payouts")]
#[schema(as = Payout)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub payout_number: String,
    pub seller_id: Uuid,
    pub status: PayoutStatus,
    pub gross_paise: i64,
    pub platform_fee_paise: i64,
    pub processing_fee_paise: i64,
    pub net_paise: i64,
    pub currency: String,
    /// Razorpay transfer id ("trf_...") once the money moved
    #[sea_orm(nullable)]
    pub transfer_id: Option<String>,
    #[sea_orm(nullable)]
    pub failure_reason: Option<String>,
    pub item_count: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::seller::Entity",
        from = "Column::SellerId",
        to = "super::seller::Column::Id"
    )]
    Seller,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::seller::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Payout lifecycle
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    /// Batched but the transfer has not been attempted
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Transfer call in flight
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Transfer confirmed by the gateway
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Transfer failed; the batch keeps its items for a manual re-run
    #[sea_orm(string_value = "failed")]
    Failed,
}
