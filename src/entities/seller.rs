use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Artisan seller registered on the marketplace. Sellers are provisioned out
/// of band; checkout and settlement only read them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sellers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    #[sea_orm(nullable)]
    pub region: Option<String>,
    /// Linked Razorpay Route account ("acc_...") receiving transfers
    #[sea_orm(nullable)]
    pub razorpay_account_id: Option<String>,
    /// Overrides the platform-wide commission percent when set
    #[sea_orm(nullable)]
    pub platform_fee_percent: Option<f64>,
    pub payout_frequency: PayoutFrequency,
    /// Seller shares below this stay unclaimed until the next window
    pub min_payout_paise: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    #[sea_orm(has_many = "super::payout::Entity")]
    Payouts,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::payout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// How often a seller's settlement window closes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum PayoutFrequency {
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl PayoutFrequency {
    /// Length of one settlement window.
    pub fn window(&self) -> chrono::Duration {
        match self {
            PayoutFrequency::Weekly => chrono::Duration::days(7),
            PayoutFrequency::Monthly => chrono::Duration::days(30),
        }
    }
}

impl Model {
    /// Whether the seller can receive gateway transfers directly.
    pub fn has_route_account(&self) -> bool {
        self.razorpay_account_id
            .as_deref()
            .map(|acc| !acc.trim().is_empty())
            .unwrap_or(false)
    }

    /// Commission percent applied to this seller's lines.
    pub fn effective_fee_percent(&self, platform_default: f64) -> f64 {
        self.platform_fee_percent.unwrap_or(platform_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller(account: Option<&str>, fee: Option<f64>) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "Kutch Weaves".into(),
            email: "kutch@example.com".into(),
            phone: None,
            region: Some("Gujarat".into()),
            razorpay_account_id: account.map(String::from),
            platform_fee_percent: fee,
            payout_frequency: PayoutFrequency::Weekly,
            min_payout_paise: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn route_account_requires_non_blank_id() {
        assert!(seller(Some("acc_123"), None).has_route_account());
        assert!(!seller(Some("   "), None).has_route_account());
        assert!(!seller(None, None).has_route_account());
    }

    #[test]
    fn fee_override_beats_platform_default() {
        assert_eq!(seller(None, Some(3.5)).effective_fee_percent(5.0), 3.5);
        assert_eq!(seller(None, None).effective_fee_percent(5.0), 5.0);
    }
}
