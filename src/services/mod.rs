// Money math shared by checkout and settlement
pub mod pricing;

// Customer-facing flows
pub mod carts;
pub mod orders;

// Seller settlement
pub mod payouts;

pub use carts::CartService;
pub use orders::OrderService;
pub use payouts::PayoutService;
