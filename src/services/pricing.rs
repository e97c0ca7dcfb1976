//! Money math for checkout and settlement.
//!
//! Every amount is an `i64` in paise. Percentages go through [`Decimal`] and
//! round half-away-from-zero once, so ₹12.345 of tax becomes 1235 paise the
//! same way everywhere: order totals, per-line commission, payout fees.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// `round(amount * percent / 100)` in paise, half away from zero.
pub fn percentage_of(amount_paise: i64, percent: f64) -> i64 {
    let percent = Decimal::from_f64(percent).unwrap_or(Decimal::ZERO);
    (Decimal::from(amount_paise) * percent / Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Order-level totals, all in paise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal_paise: i64,
    pub tax_paise: i64,
    pub shipping_fee_paise: i64,
    pub discount_paise: i64,
    pub total_paise: i64,
}

/// Computes checkout totals from a subtotal.
///
/// Tax is a percentage of the subtotal, shipping is a flat fee, and the
/// discount is clamped so the grand total can never go negative:
/// `total = subtotal + tax + shipping - discount`.
pub fn order_totals(
    subtotal_paise: i64,
    tax_percent: f64,
    shipping_flat_paise: i64,
    discount_paise: i64,
) -> OrderTotals {
    let tax_paise = percentage_of(subtotal_paise, tax_percent);
    let shipping_fee_paise = shipping_flat_paise.max(0);
    let discount_paise = discount_paise.clamp(0, subtotal_paise + tax_paise + shipping_fee_paise);
    OrderTotals {
        subtotal_paise,
        tax_paise,
        shipping_fee_paise,
        discount_paise,
        total_paise: subtotal_paise + tax_paise + shipping_fee_paise - discount_paise,
    }
}

/// Commission split of a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSplit {
    pub platform_fee_paise: i64,
    pub seller_share_paise: i64,
}

/// Splits one line total into platform fee and seller share.
/// `platform_fee + seller_share == line_total` holds exactly.
pub fn line_split(line_total_paise: i64, fee_percent: f64) -> LineSplit {
    let platform_fee_paise = percentage_of(line_total_paise, fee_percent).clamp(0, line_total_paise);
    LineSplit {
        platform_fee_paise,
        seller_share_paise: line_total_paise - platform_fee_paise,
    }
}

/// One order line attributed to a seller, input to [`seller_splits`].
#[derive(Debug, Clone, Copy)]
pub struct SplitLine {
    pub seller_id: Uuid,
    pub line_total_paise: i64,
}

/// Per-seller aggregate of line splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerSplit {
    pub seller_id: Uuid,
    pub gross_paise: i64,
    pub platform_fee_paise: i64,
    pub net_paise: i64,
}

/// Aggregates line splits per seller.
///
/// The fee is computed per line (so the stored per-item split always adds up)
/// and summed per seller; `overrides` carries per-seller commission percents
/// that replace the platform default. Sellers come back in a stable order.
pub fn seller_splits(
    lines: &[SplitLine],
    default_fee_percent: f64,
    overrides: &HashMap<Uuid, f64>,
) -> Vec<SellerSplit> {
    let mut per_seller: BTreeMap<Uuid, SellerSplit> = BTreeMap::new();
    for line in lines {
        let percent = overrides
            .get(&line.seller_id)
            .copied()
            .unwrap_or(default_fee_percent);
        let split = line_split(line.line_total_paise, percent);
        let entry = per_seller
            .entry(line.seller_id)
            .or_insert_with(|| SellerSplit {
                seller_id: line.seller_id,
                gross_paise: 0,
                platform_fee_paise: 0,
                net_paise: 0,
            });
        entry.gross_paise += line.line_total_paise;
        entry.platform_fee_paise += split.platform_fee_paise;
        entry.net_paise += split.seller_share_paise;
    }
    per_seller.into_values().collect()
}
