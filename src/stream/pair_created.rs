//! `PairCreated` log subscription
//!
//! Keeps an `eth_subscribe("logs")` subscription open against the factory and
//! forwards every decoded event on a bounded channel. A dropped socket or
//! ended subscription is retried with exponential backoff until shutdown.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use ethers::abi::RawLog;
use ethers::contract::EthEvent;
use ethers::prelude::*;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain::PairCreatedFilter;
use crate::config::mask_url;
use crate::error::{Error, Result};

/// A decoded pair-creation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCreated {
    pub token0: Address,
    pub token1: Address,
    pub pair: Address,
    pub block_number: Option<u64>,
}

/// Decode a raw factory log
pub fn decode_pair_created(log: Log) -> Result<PairCreated> {
    let block_number = log.block_number.map(|b| b.as_u64());
    let event = <PairCreatedFilter as EthEvent>::decode_log(&RawLog::from(log))
        .map_err(|e| Error::Deserialization(format!("PairCreated log: {}", e)))?;

    Ok(PairCreated {
        token0: event.token0,
        token1: event.token1,
        pair: event.pair,
        block_number,
    })
}

/// Log filter matching `PairCreated` on `factory`
pub fn pair_created_filter(factory: Address) -> Filter {
    Filter::new()
        .address(factory)
        .event(&PairCreatedFilter::abi_signature())
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Primary endpoint first; each failed connection moves to the next
    pub ws_endpoints: Vec<String>,
    pub factory: Address,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

pub struct PairCreatedListener {
    config: ListenerConfig,
    event_tx: mpsc::Sender<PairCreated>,
}

enum StreamEnd {
    /// Shutdown requested or nobody is listening any more
    Stop,
    /// Subscription ended; reconnect
    Dropped { received: u64 },
}

impl PairCreatedListener {
    pub fn new(config: ListenerConfig, event_tx: mpsc::Sender<PairCreated>) -> Self {
        Self { config, event_tx }
    }

    fn endpoint(&self, attempt: usize) -> Option<&str> {
        let endpoints = &self.config.ws_endpoints;
        if endpoints.is_empty() {
            return None;
        }
        Some(endpoints[attempt % endpoints.len()].as_str())
    }

    /// Subscribe and forward events until `shutdown` fires or the receiver is dropped
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting PairCreated listener on factory {:?}", self.config.factory);

        let mut backoff = ExponentialBackoff {
            initial_interval: self.config.initial_reconnect_delay,
            max_interval: self.config.max_reconnect_delay,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        backoff.reset();

        let mut attempt = 0usize;
        loop {
            let Some(endpoint) = self.endpoint(attempt) else {
                error!("No websocket endpoint configured, listener not started");
                break;
            };

            match self.connect_and_stream(endpoint, &shutdown).await {
                Ok(StreamEnd::Stop) => break,
                Ok(StreamEnd::Dropped { received }) => {
                    warn!(received, "PairCreated subscription ended");
                    if received > 0 {
                        backoff.reset();
                    }
                }
                Err(e) => {
                    error!(endpoint = %mask_url(endpoint), "PairCreated subscription error: {}", e);
                    attempt = attempt.wrapping_add(1);
                }
            }

            let delay = backoff.next_backoff().unwrap_or(self.config.max_reconnect_delay);
            warn!("Reconnecting in {:?}...", delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        info!("PairCreated listener stopped");
    }

    async fn connect_and_stream(&self, endpoint: &str, shutdown: &CancellationToken) -> Result<StreamEnd> {
        info!("Connecting to {}", mask_url(endpoint));

        let provider = Provider::<Ws>::connect(endpoint)
            .await
            .map_err(|e| Error::RpcConnection(e.to_string()))?;

        let filter = pair_created_filter(self.config.factory);
        let mut stream = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| Error::RpcConnection(format!("eth_subscribe failed: {}", e)))?;

        info!("Subscribed to PairCreated logs");

        let mut received = 0u64;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(StreamEnd::Stop),
                log = stream.next() => {
                    let Some(log) = log else {
                        return Ok(StreamEnd::Dropped { received });
                    };
                    received += 1;

                    if log.removed == Some(true) {
                        debug!(tx = ?log.transaction_hash, "Ignoring removed log");
                        continue;
                    }

                    let event = match decode_pair_created(log) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Skipping undecodable log: {}", e);
                            continue;
                        }
                    };

                    debug!(pair = ?event.pair, token0 = ?event.token0, token1 = ?event.token1, "PairCreated");

                    if self.event_tx.send(event).await.is_err() {
                        info!("Event receiver dropped, stopping listener");
                        return Ok(StreamEnd::Stop);
                    }
                }
            }
        }
    }
}
