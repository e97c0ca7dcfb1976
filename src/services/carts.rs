use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::cart::{self, CartStatus, Entity as Cart};
use crate::entities::cart_item::{self, Entity as CartItem};
use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Idle carts expire after this many days and a fresh one is started.
const CART_TTL_DAYS: i64 = 30;

/// Cart plus its lines and the totals derived from them.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
    pub subtotal_paise: i64,
    pub item_count: i32,
}

impl CartView {
    fn assemble(cart: cart::Model, items: Vec<cart_item::Model>) -> Self {
        let subtotal_paise = items.iter().map(|i| i.line_total_paise()).sum();
        let item_count = items.iter().map(|i| i.quantity).sum();
        Self {
            cart,
            items,
            subtotal_paise,
            item_count,
        }
    }
}

/// One line of a client-side cart snapshot submitted to `sync`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct SyncLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Result of a `sync`: the rebuilt cart and the product ids that could not
/// be kept (missing, unlisted, or out of stock).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncOutcome {
    #[serde(flatten)]
    pub cart: CartView,
    pub dropped_product_ids: Vec<Uuid>,
}

/// Shopping cart operations, always scoped to the authenticated customer's
/// single active cart. Prices on cart lines are snapshots taken from the
/// products table; client-sent prices are never accepted.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the customer's active cart, creating one lazily.
    ///
    /// An active cart past its expiry is flipped to `expired` and replaced
    /// with a fresh empty cart.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, customer_id: Uuid) -> Result<cart::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.active_cart_in(&txn, customer_id).await?;
        txn.commit().await?;
        Ok(cart)
    }

    /// Returns the active cart with its items and derived totals.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.active_cart_in(&txn, customer_id).await?;
        let view = load_view(&txn, cart).await?;
        txn.commit().await?;
        Ok(view)
    }

    /// Adds a product to the cart, merging quantities when the product is
    /// already present.
    ///
    /// The unit price and product name are looked up server-side and
    /// snapshotted onto the line. Missing or unlisted products are rejected,
    /// as is a quantity the product's stock cannot cover.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Owner of the cart
    /// * `product_id` - Product to add
    /// * `quantity` - Units to add (must be positive)
    ///
    /// # Returns
    ///
    /// * `Ok(CartView)` - Updated cart with recalculated totals
    /// * `Err(ServiceError::NotFound)` - Product does not exist
    /// * `Err(ServiceError::InvalidOperation)` - Product is not listed
    /// * `Err(ServiceError::OutOfStock)` - Stock cannot cover the quantity
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = self.active_cart_in(&txn, customer_id).await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
        if !product.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "Product {} is not available",
                product_id
            )));
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let new_quantity = existing.as_ref().map(|i| i.quantity).unwrap_or(0) + quantity;
        if !product.is_purchasable(new_quantity) {
            return Err(ServiceError::OutOfStock(format!(
                "Only {} of \"{}\" in stock",
                product.stock_quantity, product.name
            )));
        }

        if let Some(item) = existing {
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(new_quantity);
            item.product_name = Set(product.name.clone());
            item.unit_price_paise = Set(product.price_paise);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                seller_id: Set(product.seller_id),
                product_name: Set(product.name.clone()),
                unit_price_paise: Set(product.price_paise),
                quantity: Set(quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        let view = self.touch_and_load(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: view.cart.id,
                product_id,
                quantity,
            })
            .await;

        info!(
            "Added product {} x{} to cart {}",
            product_id, quantity, view.cart.id
        );
        Ok(view)
    }

    /// Sets the quantity of a cart line; zero or less removes it.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.active_cart_in(&txn, customer_id).await?;

        let item = CartItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;
        if item.cart_id != cart.id {
            return Err(ServiceError::InvalidOperation(
                "Item does not belong to this cart".to_string(),
            ));
        }

        if quantity <= 0 {
            let product_id = item.product_id;
            CartItem::delete_by_id(item_id).exec(&txn).await?;
            let view = self.touch_and_load(&txn, cart).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    cart_id: view.cart.id,
                    product_id,
                })
                .await;
            return Ok(view);
        }

        let product = Product::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
        if !product.is_purchasable(quantity) {
            return Err(ServiceError::OutOfStock(format!(
                "Only {} of \"{}\" in stock",
                product.stock_quantity, product.name
            )));
        }

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let view = self.touch_and_load(&txn, cart).await?;
        txn.commit().await?;
        Ok(view)
    }

    /// Removes a line from the cart.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        self.update_item_quantity(customer_id, item_id, 0).await
    }

    /// Empties the cart without deleting it.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.active_cart_in(&txn, customer_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let view = self.touch_and_load(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(view.cart.id))
            .await;
        Ok(view)
    }

    /// Replaces the cart's contents with a client snapshot, re-priced
    /// entirely from the products table.
    ///
    /// Lines whose product is missing, unlisted, or out of stock are dropped
    /// and reported back; a requested quantity above the available stock is
    /// clamped to it. Duplicate product ids in the snapshot are merged.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let outcome = cart_service
    ///     .sync(customer_id, vec![SyncLine { product_id, quantity: 2 }])
    ///     .await?;
    /// assert!(outcome.dropped_product_ids.is_empty());
    /// ```
    #[instrument(skip(self, lines))]
    pub async fn sync(
        &self,
        customer_id: Uuid,
        lines: Vec<SyncLine>,
    ) -> Result<SyncOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.active_cart_in(&txn, customer_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        // Merge duplicate product ids before pricing
        let mut wanted: Vec<(Uuid, i32)> = Vec::new();
        for line in lines {
            if line.quantity <= 0 {
                continue;
            }
            match wanted.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => *qty += line.quantity,
                None => wanted.push((line.product_id, line.quantity)),
            }
        }

        let mut dropped: Vec<Uuid> = Vec::new();
        for (product_id, quantity) in wanted {
            let product = match Product::find_by_id(product_id).one(&txn).await? {
                Some(p) if p.is_active && p.stock_quantity > 0 => p,
                _ => {
                    dropped.push(product_id);
                    continue;
                }
            };
            let quantity = quantity.min(product.stock_quantity);

            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                seller_id: Set(product.seller_id),
                product_name: Set(product.name.clone()),
                unit_price_paise: Set(product.price_paise),
                quantity: Set(quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;
        }

        let view = self.touch_and_load(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartSynced {
                cart_id: view.cart.id,
                lines_dropped: dropped.len(),
            })
            .await;

        info!(
            "Synced cart {}: {} lines kept, {} dropped",
            view.cart.id,
            view.items.len(),
            dropped.len()
        );
        Ok(SyncOutcome {
            cart: view,
            dropped_product_ids: dropped,
        })
    }

    /// Finds the customer's active cart inside `txn`, creating or replacing
    /// it as needed.
    async fn active_cart_in(
        &self,
        txn: &DatabaseTransaction,
        customer_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        let existing = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .order_by_desc(cart::Column::CreatedAt)
            .one(txn)
            .await?;

        if let Some(cart) = existing {
            if cart.expires_at > Utc::now() {
                return Ok(cart);
            }
            let mut stale: cart::ActiveModel = cart.into();
            stale.status = Set(CartStatus::Expired);
            stale.updated_at = Set(Utc::now());
            stale.update(txn).await?;
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            status: Set(CartStatus::Active),
            expires_at: Set(Utc::now() + Duration::days(CART_TTL_DAYS)),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(txn)
        .await?;

        info!("Created cart {} for customer {}", cart.id, customer_id);
        Ok(cart)
    }

    /// Bumps the cart's timestamps after a mutation and reloads the view.
    async fn touch_and_load(
        &self,
        txn: &DatabaseTransaction,
        cart: cart::Model,
    ) -> Result<CartView, ServiceError> {
        let mut touched: cart::ActiveModel = cart.into();
        touched.updated_at = Set(Utc::now());
        touched.expires_at = Set(Utc::now() + Duration::days(CART_TTL_DAYS));
        let cart = touched.update(txn).await?;
        load_view(txn, cart).await
    }
}

async fn load_view(
    txn: &DatabaseTransaction,
    cart: cart::Model,
) -> Result<CartView, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(txn)
        .await?;
    Ok(CartView::assemble(cart, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price_paise: i64) -> cart_item::Model {
        cart_item::Model {
            id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            product_name: "Block-printed stole".into(),
            unit_price_paise,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn view_totals_are_derived_from_lines() {
        let cart = cart::Model {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            status: CartStatus::Active,
            expires_at: Utc::now() + Duration::days(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let view = CartView::assemble(cart, vec![line(2, 45_000), line(1, 30_000)]);
        assert_eq!(view.subtotal_paise, 120_000);
        assert_eq!(view.item_count, 3);
    }
}
