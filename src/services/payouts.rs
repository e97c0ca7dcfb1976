use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::order::{self, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::payout::{self, Entity as Payout, PayoutStatus};
use crate::entities::seller::{self, Entity as Seller, PayoutFrequency};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{PaymentGateway, TransferInstruction, TransferNotes};

/// Outcome of one settlement pass, returned by the admin trigger.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SettlementReport {
    /// Payout batches created in this pass
    pub payouts_created: usize,
    /// Batches whose transfer went through
    pub completed: usize,
    /// Batches whose transfer failed; items stay claimed for review
    pub failed: usize,
    /// Sellers skipped: not due, below threshold, or nothing to pay
    pub sellers_skipped: usize,
    /// Net paise moved to sellers in this pass
    pub total_net_paise: i64,
}

/// Payout with the order items it settles.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayoutWithItems {
    pub payout: payout::Model,
    pub items: Vec<order_item::Model>,
}

/// Gross and fee roll-up of a batch of order items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchTotals {
    gross_paise: i64,
    platform_fee_paise: i64,
    item_count: i32,
}

/// Scheduled settlement of seller earnings.
///
/// Each pass walks the active sellers, batches their unclaimed shares of
/// paid orders into a payout row, and moves the net amount through the
/// gateway. Items are claimed by stamping `payout_id` inside the batching
/// transaction, so a share can never enter two batches even if two passes
/// overlap.
#[derive(Clone)]
pub struct PayoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl PayoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            config,
        }
    }

    /// Runs one settlement pass over every active seller.
    ///
    /// A seller is settled when their frequency window has elapsed since the
    /// last payout and the sum of unclaimed shares meets their minimum
    /// threshold. Shares from orders whose funds were already routed at
    /// order creation are never batched. A failed transfer leaves the batch
    /// in `failed` with its items still claimed; operators re-run it by hand
    /// after fixing the cause.
    #[instrument(skip(self))]
    pub async fn run_settlement(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SettlementReport, ServiceError> {
        let sellers = Seller::find()
            .filter(seller::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;

        let mut report = SettlementReport::default();
        for seller in sellers {
            match self.settle_seller(&seller, now).await {
                Ok(Some(payout)) => {
                    report.payouts_created += 1;
                    match payout.status {
                        PayoutStatus::Completed => {
                            report.completed += 1;
                            report.total_net_paise += payout.net_paise;
                        }
                        _ => report.failed += 1,
                    }
                }
                Ok(None) => report.sellers_skipped += 1,
                Err(err) => {
                    // One seller's failure must not starve the others
                    error!("Settlement for seller {} failed: {}", seller.id, err);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Settlement pass: {} created, {} completed, {} failed, {} skipped",
            report.payouts_created, report.completed, report.failed, report.sellers_skipped
        );
        Ok(report)
    }

    /// Lists payouts, newest first, optionally filtered by seller.
    #[instrument(skip(self))]
    pub async fn list_payouts(
        &self,
        seller_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<payout::Model>, u64), ServiceError> {
        let mut query = Payout::find().order_by_desc(payout::Column::CreatedAt);
        if let Some(seller_id) = seller_id {
            query = query.filter(payout::Column::SellerId.eq(seller_id));
        }
        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let payouts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((payouts, total))
    }

    /// Fetches a payout with the order items it claimed.
    #[instrument(skip(self))]
    pub async fn get_payout(&self, payout_id: Uuid) -> Result<PayoutWithItems, ServiceError> {
        let payout = Payout::find_by_id(payout_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payout {} not found", payout_id)))?;
        let items = payout.find_related(OrderItem).all(&*self.db).await?;
        Ok(PayoutWithItems { payout, items })
    }

    /// Settles one seller. `Ok(None)` means the seller was skipped.
    async fn settle_seller(
        &self,
        seller: &seller::Model,
        now: DateTime<Utc>,
    ) -> Result<Option<payout::Model>, ServiceError> {
        let last_period_end = Payout::find()
            .filter(payout::Column::SellerId.eq(seller.id))
            .order_by_desc(payout::Column::PeriodEnd)
            .one(&*self.db)
            .await?
            .map(|p| p.period_end);

        if !window_elapsed(last_period_end, seller.payout_frequency, now) {
            return Ok(None);
        }
        if !seller.has_route_account() {
            debug!("Seller {} has no linked account; skipping", seller.id);
            return Ok(None);
        }

        // Unclaimed shares of captured orders; routed orders settled at the
        // gateway already and never enter a batch.
        let items = OrderItem::find()
            .filter(order_item::Column::SellerId.eq(seller.id))
            .filter(order_item::Column::PayoutId.is_null())
            .inner_join(order::Entity)
            .filter(order::Column::Status.is_in([OrderStatus::Paid, OrderStatus::Fulfilled]))
            .filter(order::Column::RoutedAtSource.eq(false))
            .all(&*self.db)
            .await?;
        if items.is_empty() {
            return Ok(None);
        }

        let totals = batch_totals(&items);
        if totals.gross_paise < seller.min_payout_paise {
            debug!(
                "Seller {} has {} paise unclaimed, below threshold {}",
                seller.id, totals.gross_paise, seller.min_payout_paise
            );
            return Ok(None);
        }
        let processing_fee = self.config.payout.processing_fee_paise;
        let net_paise = totals.gross_paise - processing_fee;
        if net_paise <= 0 {
            debug!(
                "Seller {} gross {} does not clear the {} paise processing fee",
                seller.id, totals.gross_paise, processing_fee
            );
            return Ok(None);
        }

        let payout_id = Uuid::new_v4();
        let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        let period_start =
            last_period_end.unwrap_or_else(|| now - seller.payout_frequency.window());

        let txn = self.db.begin().await?;
        let payout = payout::ActiveModel {
            id: Set(payout_id),
            payout_number: Set(generate_payout_number()),
            seller_id: Set(seller.id),
            status: Set(PayoutStatus::Pending),
            gross_paise: Set(totals.gross_paise),
            platform_fee_paise: Set(totals.platform_fee_paise),
            processing_fee_paise: Set(processing_fee),
            net_paise: Set(net_paise),
            currency: Set(self.config.currency.clone()),
            transfer_id: Set(None),
            failure_reason: Set(None),
            item_count: Set(totals.item_count),
            period_start: Set(period_start),
            period_end: Set(now),
            completed_at: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        // The null guard makes the claim exclusive: items another pass took
        // in the meantime stay with that pass.
        let claimed = OrderItem::update_many()
            .col_expr(order_item::Column::PayoutId, Expr::value(payout_id))
            .col_expr(order_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order_item::Column::Id.is_in(item_ids.clone()))
            .filter(order_item::Column::PayoutId.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected != item_ids.len() as u64 {
            txn.rollback().await?;
            warn!(
                "Seller {}: claimed {}/{} items, batch abandoned",
                seller.id,
                claimed.rows_affected,
                item_ids.len()
            );
            return Ok(None);
        }
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PayoutCreated {
                payout_id,
                seller_id: seller.id,
                net_paise,
            })
            .await;
        info!(
            "Created payout {} for seller {}: {} items, {} paise net",
            payout.payout_number,
            seller.id,
            item_ids.len(),
            net_paise
        );

        let payout = self.execute_transfer(payout, seller).await?;
        Ok(Some(payout))
    }

    /// Moves the batch's net amount to the seller's linked account and
    /// records the outcome.
    async fn execute_transfer(
        &self,
        payout: payout::Model,
        seller: &seller::Model,
    ) -> Result<payout::Model, ServiceError> {
        let mut processing: payout::ActiveModel = payout.into();
        processing.status = Set(PayoutStatus::Processing);
        processing.updated_at = Set(Some(Utc::now()));
        let payout = processing.update(&*self.db).await?;

        let instruction = TransferInstruction {
            account: seller.razorpay_account_id.clone().unwrap_or_default(),
            amount_paise: payout.net_paise,
            currency: payout.currency.clone(),
            notes: TransferNotes {
                seller_id: seller.id,
                seller_name: seller.name.clone(),
                order_id: None,
                payout_id: Some(payout.id),
            },
        };

        let payout_id = payout.id;
        match self.gateway.transfer(instruction).await {
            Ok(transfer) => {
                let mut done: payout::ActiveModel = payout.into();
                done.status = Set(PayoutStatus::Completed);
                done.transfer_id = Set(Some(transfer.id.clone()));
                done.completed_at = Set(Some(Utc::now()));
                done.updated_at = Set(Some(Utc::now()));
                let payout = done.update(&*self.db).await?;

                self.event_sender
                    .send_or_log(Event::PayoutCompleted {
                        payout_id,
                        transfer_id: transfer.id.clone(),
                    })
                    .await;
                info!(
                    "Payout {} completed with transfer {}",
                    payout.payout_number, transfer.id
                );
                Ok(payout)
            }
            Err(err) => {
                let reason = err.to_string();
                let mut failed: payout::ActiveModel = payout.into();
                failed.status = Set(PayoutStatus::Failed);
                failed.failure_reason = Set(Some(reason.clone()));
                failed.updated_at = Set(Some(Utc::now()));
                let payout = failed.update(&*self.db).await?;

                self.event_sender
                    .send_or_log(Event::PayoutFailed {
                        payout_id,
                        reason: reason.clone(),
                    })
                    .await;
                error!("Payout {} transfer failed: {}", payout.payout_number, reason);
                Ok(payout)
            }
        }
    }
}

/// Spawns the background settlement loop, one pass per interval.
pub fn start_scheduler(service: PayoutService, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(interval_secs.max(60));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so settlement starts one
        // full interval after boot.
        ticker.tick().await;
        info!("Payout scheduler running every {:?}", period);
        loop {
            ticker.tick().await;
            match service.run_settlement(Utc::now()).await {
                Ok(report) if report.payouts_created > 0 => {
                    info!(
                        "Scheduled settlement created {} payouts ({} paise net)",
                        report.payouts_created, report.total_net_paise
                    );
                }
                Ok(_) => debug!("Scheduled settlement found nothing to pay"),
                Err(err) => error!("Scheduled settlement failed: {}", err),
            }
        }
    })
}

/// Whether a seller's settlement window has elapsed.
fn window_elapsed(
    last_period_end: Option<DateTime<Utc>>,
    frequency: PayoutFrequency,
    now: DateTime<Utc>,
) -> bool {
    match last_period_end {
        None => true,
        Some(end) => now >= end + frequency.window(),
    }
}

fn batch_totals(items: &[order_item::Model]) -> BatchTotals {
    BatchTotals {
        gross_paise: items.iter().map(|i| i.seller_share_paise).sum(),
        platform_fee_paise: items.iter().map(|i| i.platform_fee_paise).sum(),
        item_count: items.len() as i32,
    }
}

fn generate_payout_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "PO-{}-{}",
        Utc::now().format("%Y%m%d"),
        suffix[..6].to_uppercase()
    )
}
