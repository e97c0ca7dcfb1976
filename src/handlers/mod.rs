// HTTP surface. Routers are assembled into /api/v1 in lib.rs.
pub mod carts;
pub mod checkout;
pub mod common;
pub mod payouts;
pub mod webhooks;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use crate::services::{CartService, OrderService, PayoutService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub payouts: Arc<PayoutService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        let carts = Arc::new(CartService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(
            db.clone(),
            event_sender.clone(),
            gateway.clone(),
            config.clone(),
        ));
        let payouts = Arc::new(PayoutService::new(db, event_sender, gateway, config));
        Self {
            carts,
            orders,
            payouts,
        }
    }
}
