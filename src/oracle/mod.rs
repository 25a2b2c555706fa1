//! Off-chain price, verification and search lookups

pub mod http;

use async_trait::async_trait;
use ethers::types::Address;

use crate::error::Result;

pub use http::HttpOracle;

/// Source verification status reported by the block explorer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub verified: bool,
    pub contract_name: Option<String>,
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
}

/// Price and metadata lookups
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Fiat (USD) price of one token unit; `None` when the token is unlisted
    async fn price(&self, token: Address) -> Result<Option<f64>>;

    async fn verification(&self, token: Address) -> Result<Verification>;

    async fn sentiment(&self, query: &str) -> Result<Vec<SearchHit>>;
}
