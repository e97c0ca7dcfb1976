use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::AppConfig;
use crate::entities::cart::{self, CartStatus, Entity as Cart};
use crate::entities::cart_item::{self, Entity as CartItem};
use crate::entities::order::{self, Entity as Order, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::product::{self, Entity as Product};
use crate::entities::seller::{self, Entity as Seller};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{
    CreateGatewayOrder, OrderNotes, PaymentGateway, SignatureVerifier, TransferInstruction,
    TransferNotes,
};
use crate::services::pricing::{self, SplitLine};

/// Checkout request. The shipping address is stored as an opaque snapshot;
/// prices and totals are never taken from the client.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[schema(value_type = Object)]
    pub shipping_address: serde_json::Value,
    /// Client-chosen key making retries of the same checkout safe
    #[validate(length(
        min = 1,
        max = 64,
        message = "Idempotency key must be between 1 and 64 characters"
    ))]
    pub idempotency_key: Option<String>,
}

/// Callback parameters the Razorpay checkout widget hands to the frontend.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, message = "razorpay_order_id is required"))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1, message = "razorpay_payment_id is required"))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1, message = "razorpay_signature is required"))]
    pub razorpay_signature: String,
}

/// Admin-initiated refund. Omitting the amount refunds the full order total.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RefundRequest {
    pub amount_paise: Option<i64>,
    #[validate(length(max = 255, message = "Reason must be at most 255 characters"))]
    pub reason: Option<String>,
}

/// Order plus its lines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Everything the frontend needs to open the Razorpay checkout widget.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: OrderWithItems,
    pub razorpay_order_id: String,
    pub amount_paise: i64,
    pub currency: String,
    /// Publishable key id for the client-side widget
    pub razorpay_key_id: String,
    /// True when an idempotency key matched an order created earlier
    pub idempotent_replay: bool,
}

/// Result of a signature verification attempt. A mismatch is reported here,
/// not as an error, so the frontend can offer a retry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub order: order::Model,
}

/// Cart line re-priced from the catalog at checkout time.
struct PricedLine {
    product_id: Uuid,
    seller_id: Uuid,
    product_name: String,
    unit_price_paise: i64,
    quantity: i32,
    line_total_paise: i64,
}

/// Checkout and order lifecycle.
///
/// Creating an order converts the customer's active cart into priced,
/// split order lines and opens a matching order on the payment gateway.
/// Payment verification is the only path that marks an order `paid`.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    config: Arc<AppConfig>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        let verifier = SignatureVerifier::new(
            config.razorpay.key_secret.clone(),
            config.razorpay.webhook_secret.clone(),
        );
        Self {
            db,
            event_sender,
            gateway,
            verifier,
            config,
        }
    }

    /// Turns the customer's active cart into an order and opens it on the
    /// payment gateway.
    ///
    /// Every line is re-priced from the products table first; the client's
    /// idea of prices never reaches the math. When an idempotency key is
    /// supplied and an order with that key already exists for this customer,
    /// the existing order is returned and the gateway is not called again.
    /// The gateway call happens before anything is persisted, so a gateway
    /// failure leaves no order behind.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Authenticated cart owner
    /// * `req` - Shipping address snapshot and optional idempotency key
    ///
    /// # Returns
    ///
    /// * `Ok(CheckoutResponse)` - Persisted order plus the gateway order id
    ///   and publishable key for the checkout widget
    /// * `Err(ServiceError::InvalidOperation)` - Cart empty or a product
    ///   became unavailable
    /// * `Err(ServiceError::OutOfStock)` - Requested quantity exceeds stock
    /// * `Err(ServiceError::GatewayError)` - Gateway order creation failed
    #[instrument(skip(self, req))]
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        if let Some(key) = req.idempotency_key.as_deref() {
            if let Some(existing) = self.find_by_idempotency_key(customer_id, key).await? {
                info!("Replaying order {} for idempotency key", existing.id);
                let items = existing.find_related(OrderItem).all(&*self.db).await?;
                return Ok(self.checkout_response(existing, items, true));
            }
        }

        let cart = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::InvalidOperation("Cart is empty".to_string()))?;
        let cart_items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        if cart_items.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let lines = self.reprice_lines(&cart_items).await?;
        let sellers = self.load_sellers(&lines).await?;

        let subtotal: i64 = lines.iter().map(|l| l.line_total_paise).sum();
        let totals = pricing::order_totals(
            subtotal,
            self.config.tax_rate_percent,
            self.config.shipping_fee_paise,
            0,
        );

        let overrides: HashMap<Uuid, f64> = sellers
            .values()
            .filter_map(|s| s.platform_fee_percent.map(|p| (s.id, p)))
            .collect();
        let split_lines: Vec<SplitLine> = lines
            .iter()
            .map(|l| SplitLine {
                seller_id: l.seller_id,
                line_total_paise: l.line_total_paise,
            })
            .collect();
        let splits =
            pricing::seller_splits(&split_lines, self.config.platform_fee_percent, &overrides);

        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();
        let transfers = self.route_transfers(order_id, &splits, &sellers);
        let routed_at_source = !transfers.is_empty();

        let gateway_order = self
            .gateway
            .create_order(CreateGatewayOrder {
                amount_paise: totals.total_paise,
                currency: self.config.currency.clone(),
                receipt: order_number.clone(),
                notes: OrderNotes {
                    order_id,
                    customer_id,
                },
                transfers,
            })
            .await?;

        let txn = self.db.begin().await?;

        let inserted = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            customer_id: Set(customer_id),
            status: Set(OrderStatus::Created),
            subtotal_paise: Set(totals.subtotal_paise),
            tax_paise: Set(totals.tax_paise),
            shipping_fee_paise: Set(totals.shipping_fee_paise),
            discount_paise: Set(totals.discount_paise),
            total_paise: Set(totals.total_paise),
            currency: Set(self.config.currency.clone()),
            razorpay_order_id: Set(Some(gateway_order.id.clone())),
            razorpay_payment_id: Set(None),
            razorpay_signature: Set(None),
            routed_at_source: Set(routed_at_source),
            payment_captured_at: Set(None),
            refund_id: Set(None),
            refunded_at: Set(None),
            idempotency_key: Set(req.idempotency_key.clone()),
            shipping_address: Set(Some(req.shipping_address)),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await;

        let order = match inserted {
            Ok(order) => order,
            // A concurrent request with the same key won the insert; the
            // unique index makes this loser replay the winner's order.
            Err(err) if is_unique_violation(&err) && req.idempotency_key.is_some() => {
                txn.rollback().await?;
                let key = req.idempotency_key.as_deref().unwrap_or_default();
                let existing = self
                    .find_by_idempotency_key(customer_id, key)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::Conflict("Duplicate order submission".to_string())
                    })?;
                info!("Replaying order {} after idempotency race", existing.id);
                let items = existing.find_related(OrderItem).all(&*self.db).await?;
                return Ok(self.checkout_response(existing, items, true));
            }
            Err(err) => return Err(err.into()),
        };

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let percent = sellers
                .get(&line.seller_id)
                .map(|s| s.effective_fee_percent(self.config.platform_fee_percent))
                .unwrap_or(self.config.platform_fee_percent);
            let split = pricing::line_split(line.line_total_paise, percent);

            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                seller_id: Set(line.seller_id),
                product_name: Set(line.product_name.clone()),
                unit_price_paise: Set(line.unit_price_paise),
                quantity: Set(line.quantity),
                line_total_paise: Set(line.line_total_paise),
                platform_fee_paise: Set(split.platform_fee_paise),
                seller_share_paise: Set(split.seller_share_paise),
                payout_id: Set(None),
                created_at: Set(Utc::now()),
                updated_at: Set(None),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        let mut converted: cart::ActiveModel = cart.into();
        converted.status = Set(CartStatus::Converted);
        converted.updated_at = Set(Utc::now());
        converted.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order.id))
            .await;
        info!(
            "Created order {} ({}) for {} paise, gateway order {}",
            order.id, order.order_number, order.total_paise, gateway_order.id
        );
        Ok(self.checkout_response(order, items, false))
    }

    /// Verifies the checkout callback signature and marks the order paid.
    ///
    /// The expected signature is HMAC-SHA256 over
    /// `"{razorpay_order_id}|{razorpay_payment_id}"` with the key secret,
    /// compared in constant time. A mismatch leaves the order untouched and
    /// comes back as `verified: false`. Verifying an already-paid order with
    /// the same payment id succeeds without touching the gateway again.
    #[instrument(skip(self, req))]
    pub async fn verify_payment(
        &self,
        customer_id: Uuid,
        req: VerifyPaymentRequest,
    ) -> Result<VerificationOutcome, ServiceError> {
        let order = Order::find()
            .filter(order::Column::RazorpayOrderId.eq(req.razorpay_order_id.as_str()))
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No order for gateway order {}",
                    req.razorpay_order_id
                ))
            })?;

        if order.status == OrderStatus::Paid {
            if order.razorpay_payment_id.as_deref() == Some(req.razorpay_payment_id.as_str()) {
                return Ok(VerificationOutcome {
                    verified: true,
                    order,
                });
            }
            return Err(ServiceError::Conflict(
                "Order is already paid with a different payment".to_string(),
            ));
        }
        if !matches!(order.status, OrderStatus::Created | OrderStatus::Failed) {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot accept a payment",
                order.order_number
            )));
        }

        if !self.verifier.verify_payment_signature(
            &req.razorpay_order_id,
            &req.razorpay_payment_id,
            &req.razorpay_signature,
        ) {
            warn!(
                "Signature mismatch for order {} payment {}",
                order.id, req.razorpay_payment_id
            );
            self.event_sender
                .send_or_log(Event::OrderPaymentFailed {
                    order_id: order.id,
                    reason: "signature mismatch".to_string(),
                })
                .await;
            return Ok(VerificationOutcome {
                verified: false,
                order,
            });
        }

        if !self.config.razorpay.auto_capture {
            let captured = self
                .gateway
                .capture_payment(&req.razorpay_payment_id, order.total_paise, &order.currency)
                .await?;
            if captured.amount_paise != order.total_paise {
                return Err(ServiceError::PaymentFailed(format!(
                    "Captured {} paise but the order total is {}",
                    captured.amount_paise, order.total_paise
                )));
            }
        }

        let order = self
            .mark_paid(
                order,
                &req.razorpay_payment_id,
                Some(&req.razorpay_signature),
            )
            .await?;
        Ok(VerificationOutcome {
            verified: true,
            order,
        })
    }

    /// Lists the customer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Fetches one of the customer's orders with its lines.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Cancels an order that has not been paid. Paid orders go through
    /// refund instead.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.customer_id == customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if matches!(order.status, OrderStatus::Paid | OrderStatus::Fulfilled) {
            return Err(ServiceError::InvalidOperation(
                "Paid orders must be refunded, not cancelled".to_string(),
            ));
        }
        if !order.status.can_cancel() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot be cancelled",
                order.order_number
            )));
        }

        let order_id = order.id;
        let mut cancelled: order::ActiveModel = order.into();
        cancelled.status = Set(OrderStatus::Cancelled);
        cancelled.updated_at = Set(Some(Utc::now()));
        let order = cancelled.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        info!("Cancelled order {}", order_id);
        Ok(order)
    }

    /// Refunds a paid order through the gateway, fully or partially.
    /// Admin-only; the handler enforces the role.
    #[instrument(skip(self, req))]
    pub async fn refund_order(
        &self,
        order_id: Uuid,
        req: RefundRequest,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status == OrderStatus::Refunded {
            return Err(ServiceError::Conflict(
                "Order is already refunded".to_string(),
            ));
        }
        if !order.status.can_refund() {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} has no captured payment to refund",
                order.order_number
            )));
        }
        let payment_id = order.razorpay_payment_id.clone().ok_or_else(|| {
            ServiceError::InvalidOperation("Order has no recorded payment id".to_string())
        })?;
        let amount = refund_amount(req.amount_paise, order.total_paise)?;

        let refund = self.gateway.refund_payment(&payment_id, amount).await?;

        let order_id = order.id;
        let mut refunded: order::ActiveModel = order.into();
        refunded.status = Set(OrderStatus::Refunded);
        refunded.refund_id = Set(Some(refund.id.clone()));
        refunded.refunded_at = Set(Some(Utc::now()));
        refunded.updated_at = Set(Some(Utc::now()));
        let order = refunded.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderRefunded {
                order_id,
                refund_id: refund.id.clone(),
            })
            .await;
        info!(
            "Refunded {} paise on order {} (refund {}, reason: {})",
            amount,
            order_id,
            refund.id,
            req.reason.as_deref().unwrap_or("none given")
        );
        Ok(order)
    }

    /// Applies a `payment.captured` webhook. Unknown gateway orders are
    /// logged and skipped; an order already paid stays as it is.
    #[instrument(skip(self))]
    pub async fn confirm_captured(
        &self,
        razorpay_order_id: &str,
        payment_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let order = match self.find_by_gateway_order(razorpay_order_id).await? {
            Some(order) => order,
            None => {
                warn!(
                    "Capture webhook for unknown gateway order {}",
                    razorpay_order_id
                );
                return Ok(None);
            }
        };
        match order.status {
            OrderStatus::Created | OrderStatus::Failed => {
                Ok(Some(self.mark_paid(order, payment_id, None).await?))
            }
            _ => Ok(Some(order)),
        }
    }

    /// Applies a `payment.failed` webhook: a still-unpaid order flips to
    /// `failed`, anything else is left alone.
    #[instrument(skip(self))]
    pub async fn mark_payment_failed(
        &self,
        razorpay_order_id: &str,
        reason: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let order = match self.find_by_gateway_order(razorpay_order_id).await? {
            Some(order) => order,
            None => {
                warn!(
                    "Failure webhook for unknown gateway order {}",
                    razorpay_order_id
                );
                return Ok(None);
            }
        };
        if order.status != OrderStatus::Created {
            return Ok(Some(order));
        }

        let order_id = order.id;
        let mut failed: order::ActiveModel = order.into();
        failed.status = Set(OrderStatus::Failed);
        failed.updated_at = Set(Some(Utc::now()));
        let order = failed.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderPaymentFailed {
                order_id,
                reason: reason.to_string(),
            })
            .await;
        warn!("Payment failed for order {}: {}", order_id, reason);
        Ok(Some(order))
    }

    /// Applies a `refund.processed` webhook. Idempotent: an order already
    /// marked refunded is returned unchanged.
    #[instrument(skip(self))]
    pub async fn record_refund(
        &self,
        razorpay_payment_id: &str,
        refund_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let order = Order::find()
            .filter(order::Column::RazorpayPaymentId.eq(razorpay_payment_id))
            .one(&*self.db)
            .await?;
        let order = match order {
            Some(order) => order,
            None => {
                warn!("Refund webhook for unknown payment {}", razorpay_payment_id);
                return Ok(None);
            }
        };
        if order.status == OrderStatus::Refunded {
            return Ok(Some(order));
        }

        let order_id = order.id;
        let mut refunded: order::ActiveModel = order.into();
        refunded.status = Set(OrderStatus::Refunded);
        refunded.refund_id = Set(Some(refund_id.to_string()));
        refunded.refunded_at = Set(Some(Utc::now()));
        refunded.updated_at = Set(Some(Utc::now()));
        let order = refunded.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderRefunded {
                order_id,
                refund_id: refund_id.to_string(),
            })
            .await;
        Ok(Some(order))
    }

    /// Marks an order paid and decrements product stock, in one transaction.
    async fn mark_paid(
        &self,
        order: order::Model,
        payment_id: &str,
        signature: Option<&str>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;
        for item in &items {
            if let Some(product) = Product::find_by_id(item.product_id).one(&txn).await? {
                let remaining = (product.stock_quantity - item.quantity).max(0);
                let mut updated: product::ActiveModel = product.into();
                updated.stock_quantity = Set(remaining);
                updated.updated_at = Set(Some(Utc::now()));
                updated.update(&txn).await?;
            }
        }

        let order_id = order.id;
        let mut paid: order::ActiveModel = order.into();
        paid.status = Set(OrderStatus::Paid);
        paid.razorpay_payment_id = Set(Some(payment_id.to_string()));
        if let Some(signature) = signature {
            paid.razorpay_signature = Set(Some(signature.to_string()));
        }
        paid.payment_captured_at = Set(Some(Utc::now()));
        paid.updated_at = Set(Some(Utc::now()));
        let order = paid.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderPaid {
                order_id,
                payment_id: payment_id.to_string(),
            })
            .await;
        info!("Order {} paid with payment {}", order_id, payment_id);
        Ok(order)
    }

    /// Re-reads every cart line from the catalog, rejecting lines whose
    /// product is gone, unlisted, or short on stock.
    async fn reprice_lines(
        &self,
        cart_items: &[cart_item::Model],
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let product_ids: Vec<Uuid> = cart_items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(cart_items.len());
        for item in cart_items {
            let product = products
                .get(&item.product_id)
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    ServiceError::InvalidOperation(format!(
                        "\"{}\" is no longer available",
                        item.product_name
                    ))
                })?;
            if !product.is_purchasable(item.quantity) {
                return Err(ServiceError::OutOfStock(format!(
                    "Only {} of \"{}\" in stock",
                    product.stock_quantity, product.name
                )));
            }
            lines.push(PricedLine {
                product_id: product.id,
                seller_id: product.seller_id,
                product_name: product.name.clone(),
                unit_price_paise: product.price_paise,
                quantity: item.quantity,
                line_total_paise: product.price_paise * i64::from(item.quantity),
            });
        }
        Ok(lines)
    }

    async fn load_sellers(
        &self,
        lines: &[PricedLine],
    ) -> Result<HashMap<Uuid, seller::Model>, ServiceError> {
        let mut seller_ids: Vec<Uuid> = lines.iter().map(|l| l.seller_id).collect();
        seller_ids.sort_unstable();
        seller_ids.dedup();

        let sellers: HashMap<Uuid, seller::Model> = Seller::find()
            .filter(seller::Column::Id.is_in(seller_ids.clone()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        for id in &seller_ids {
            if !sellers.contains_key(id) {
                return Err(ServiceError::InternalError(format!(
                    "Seller {} referenced by a product does not exist",
                    id
                )));
            }
        }
        Ok(sellers)
    }

    /// Builds Route transfer instructions for split-on-create mode.
    ///
    /// Transfers are only attached when every seller on the order has a
    /// linked account; otherwise the whole order falls back to scheduled
    /// settlement so no seller share is routed twice or lost.
    fn route_transfers(
        &self,
        order_id: Uuid,
        splits: &[pricing::SellerSplit],
        sellers: &HashMap<Uuid, seller::Model>,
    ) -> Vec<TransferInstruction> {
        if !self.config.razorpay.split_on_create {
            return Vec::new();
        }
        let all_routable = splits.iter().all(|s| {
            sellers
                .get(&s.seller_id)
                .map(|m| m.has_route_account())
                .unwrap_or(false)
        });
        if !all_routable {
            warn!(
                "Order {} has sellers without linked accounts; settling via payouts instead",
                order_id
            );
            return Vec::new();
        }

        splits
            .iter()
            .filter_map(|split| {
                let seller = sellers.get(&split.seller_id)?;
                Some(TransferInstruction {
                    account: seller.razorpay_account_id.clone().unwrap_or_default(),
                    amount_paise: split.net_paise,
                    currency: self.config.currency.clone(),
                    notes: TransferNotes {
                        seller_id: split.seller_id,
                        seller_name: seller.name.clone(),
                        order_id: Some(order_id),
                        payout_id: None,
                    },
                })
            })
            .collect()
    }

    async fn find_by_idempotency_key(
        &self,
        customer_id: Uuid,
        key: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::IdempotencyKey.eq(key))
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?)
    }

    async fn find_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::RazorpayOrderId.eq(razorpay_order_id))
            .one(&*self.db)
            .await?)
    }

    fn checkout_response(
        &self,
        order: order::Model,
        items: Vec<order_item::Model>,
        idempotent_replay: bool,
    ) -> CheckoutResponse {
        CheckoutResponse {
            razorpay_order_id: order.razorpay_order_id.clone().unwrap_or_default(),
            amount_paise: order.total_paise,
            currency: order.currency.clone(),
            razorpay_key_id: self.config.razorpay.key_id.clone(),
            idempotent_replay,
            order: OrderWithItems { order, items },
        }
    }
}

/// Validates a requested refund amount against the order total, defaulting
/// to a full refund.
fn refund_amount(requested: Option<i64>, total_paise: i64) -> Result<i64, ServiceError> {
    match requested {
        None => Ok(total_paise),
        Some(amount) if amount > 0 && amount <= total_paise => Ok(amount),
        Some(amount) => Err(ServiceError::BadRequest(format!(
            "Refund amount must be between 1 and {} paise, got {}",
            total_paise, amount
        ))),
    }
}

fn generate_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "HAAT-{}-{}",
        Utc::now().format("%Y%m%d"),
        suffix[..6].to_uppercase()
    )
}

// Matches both the Postgres and SQLite unique-constraint error texts.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    err.to_string().to_lowercase().contains("unique")
}
