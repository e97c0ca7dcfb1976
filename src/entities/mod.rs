//! SeaORM entities backing the marketplace schema.
//!
//! All monetary columns are `i64` amounts in paise so arithmetic stays exact
//! end to end; rupee formatting is a presentation concern.

pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payout;
pub mod product;
pub mod seller;
pub mod webhook_event;
