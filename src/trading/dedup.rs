//! Duplicate-trade guard
//!
//! PairCreated delivery is at-least-once, and one token can appear in more
//! than one pair. A token is claimed before it is traded; a second claim
//! inside the window is refused.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ethers::types::Address;
use tracing::debug;

pub struct TradeGuard {
    claims: DashMap<Address, Instant>,
    window: Duration,
}

impl TradeGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            claims: DashMap::new(),
            window,
        }
    }

    /// Claim `token` for trading. Returns false if it was claimed within the window.
    pub fn try_claim(&self, token: Address) -> bool {
        let now = Instant::now();
        match self.claims.entry(token) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    debug!(token = ?token, "Token already claimed");
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drop the claim on `token` so a later event may retry it
    pub fn release(&self, token: Address) {
        self.claims.remove(&token);
    }

    /// Forget claims older than the window
    pub fn prune(&self) {
        let window = self.window;
        self.claims.retain(|_, claimed| claimed.elapsed() < window);
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
