//! Pair Sniper Library
//!
//! Watches a Uniswap V2 factory for `PairCreated`, screens each new token
//! through ordered legitimacy gates (including a honeypot round-trip
//! simulation), buys the survivors through the V3 router and tracks the
//! resulting positions with a stop-loss.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod notify;
pub mod oracle;
pub mod position;
pub mod sniper;
pub mod stream;
pub mod trading;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
