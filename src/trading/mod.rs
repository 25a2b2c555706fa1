//! Trade execution
//!
//! Swaps go through the router's `exactInputSingle`; the [`TradeGuard`]
//! keeps one token from being bought twice by concurrent events.

pub mod dedup;
pub mod executor;

pub use dedup::TradeGuard;
pub use executor::{TradeExecutor, TradeResult};
