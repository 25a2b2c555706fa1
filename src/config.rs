//! Configuration loading and validation
//!
//! Static configuration comes from `config.toml` plus `SNIPER__*` environment
//! overrides. The knobs an operator may change while the bot runs (trade
//! amount, minimum liquidity, stop-loss, the running toggle) live in
//! [`RuntimeSettings`], which every event handler snapshots before acting.

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

// Re-export the honeypot policy so it can be set from config.toml
pub use crate::filter::honeypot::AmbiguousRevertPolicy;

/// Wrapped ether on mainnet
pub const MAINNET_WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
/// Uniswap V2 factory (emits PairCreated)
pub const UNISWAP_V2_FACTORY: &str = "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f";
/// Uniswap V3 SwapRouter (exactInputSingle)
pub const UNISWAP_V3_ROUTER: &str = "0xE592427A0AEce92De3Edee1F18E0157C05861564";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub backpressure: BackpressureConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub positions: PositionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,
    /// Tried in order when `ws_endpoint` cannot be reached
    #[serde(default = "default_fallback_ws_endpoints")]
    pub fallback_ws_endpoints: Vec<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    #[serde(default = "default_factory")]
    pub factory: String,
    #[serde(default = "default_router")]
    pub router: String,
    /// Funding asset every candidate pair must contain
    #[serde(default = "default_base_asset")]
    pub base_asset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackpressureConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Base-asset amount spent per trade (ETH units)
    #[serde(default = "default_trade_amount_eth")]
    pub trade_amount_eth: f64,
    /// Router fee tier (3000 = 0.3%)
    #[serde(default = "default_fee_tier")]
    pub fee_tier: u32,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Swap deadline, seconds from submission
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Upper bound on signing and broadcasting a swap
    #[serde(default = "default_submission_timeout_secs")]
    pub submission_timeout_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// A token traded within this window is not traded again
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Minimum base-asset reserve in the pair (ETH units)
    #[serde(default = "default_min_liquidity_eth")]
    pub min_liquidity_eth: f64,
    /// Maximum share of supply our own wallet may hold
    #[serde(default = "default_max_supply_fraction")]
    pub max_supply_fraction: f64,
    /// Positive search results required by the sentiment gate
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: usize,
    #[serde(default = "default_sentiment_keywords")]
    pub sentiment_keywords: Vec<String>,
    #[serde(default = "default_sentiment_query_suffix")]
    pub sentiment_query_suffix: String,
    #[serde(default)]
    pub ambiguous_revert_policy: AmbiguousRevertPolicy,
    /// A gate still running after this long fails
    #[serde(default = "default_gate_timeout_secs")]
    pub gate_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
    #[serde(default = "default_etherscan_url")]
    pub etherscan_url: String,
    #[serde(default = "default_etherscan_api_key")]
    pub etherscan_api_key: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_google_api_key")]
    pub google_api_key: String,
    #[serde(default = "default_google_cx")]
    pub google_cx: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionConfig {
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    #[serde(default = "default_revaluation_interval_secs")]
    pub revaluation_interval_secs: u64,
    /// Close a position once its loss exceeds this fraction of entry value
    #[serde(default = "default_stop_loss_fraction")]
    pub stop_loss_fraction: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub log_enabled: bool,
    #[serde(default = "default_telegram_bot_token")]
    pub telegram_bot_token: String,
    #[serde(default = "default_telegram_chat_id")]
    pub telegram_chat_id: String,
    #[serde(default = "default_explorer_tx_url")]
    pub explorer_tx_url: String,
}

// Default value functions
fn default_ws_endpoint() -> String {
    std::env::var("RPC_WS_ENDPOINT").unwrap_or_else(|_| "ws://127.0.0.1:8546".into())
}

fn default_fallback_ws_endpoints() -> Vec<String> {
    std::env::var("RPC_WS_FALLBACK_ENDPOINTS")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn default_chain_id() -> u64 {
    1
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_confirmations() -> usize {
    1
}

fn default_factory() -> String {
    UNISWAP_V2_FACTORY.into()
}

fn default_router() -> String {
    UNISWAP_V3_ROUTER.into()
}

fn default_base_asset() -> String {
    MAINNET_WETH.into()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_trade_amount_eth() -> f64 {
    std::env::var("TRADE_AMOUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.01)
}

fn default_fee_tier() -> u32 {
    3000
}

fn default_gas_limit() -> u64 {
    300_000
}

fn default_deadline_secs() -> u64 {
    120
}

fn default_submission_timeout_secs() -> u64 {
    30
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_dedup_window_secs() -> u64 {
    600
}

fn default_gate_timeout_secs() -> u64 {
    30
}

fn default_min_liquidity_eth() -> f64 {
    std::env::var("MIN_LIQUIDITY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.1)
}

fn default_max_supply_fraction() -> f64 {
    0.1
}

fn default_sentiment_threshold() -> usize {
    2
}

fn default_sentiment_keywords() -> Vec<String> {
    ["moon", "rocket", "gain", "bull", "up"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_sentiment_query_suffix() -> String {
    "memecoin".into()
}

fn default_coingecko_url() -> String {
    "https://api.coingecko.com/api/v3".into()
}

fn default_etherscan_url() -> String {
    "https://api.etherscan.io/api".into()
}

fn default_etherscan_api_key() -> String {
    std::env::var("ETHERSCAN_API_KEY").unwrap_or_default()
}

fn default_search_url() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}

fn default_google_api_key() -> String {
    std::env::var("GOOGLE_API_KEY").unwrap_or_default()
}

fn default_google_cx() -> String {
    std::env::var("GOOGLE_CX").unwrap_or_default()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_ledger_path() -> String {
    "tradeLog.json".into()
}

fn default_revaluation_interval_secs() -> u64 {
    60
}

fn default_stop_loss_fraction() -> f64 {
    0.2
}

fn default_telegram_bot_token() -> String {
    std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default()
}

fn default_telegram_chat_id() -> String {
    std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default()
}

fn default_explorer_tx_url() -> String {
    "https://etherscan.io/tx/".into()
}

fn default_true() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            ws_endpoint: default_ws_endpoint(),
            fallback_ws_endpoints: default_fallback_ws_endpoints(),
            chain_id: default_chain_id(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            confirmations: default_confirmations(),
        }
    }
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            factory: default_factory(),
            router: default_router(),
            base_asset: default_base_asset(),
        }
    }
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            trade_amount_eth: default_trade_amount_eth(),
            fee_tier: default_fee_tier(),
            gas_limit: default_gas_limit(),
            deadline_secs: default_deadline_secs(),
            submission_timeout_secs: default_submission_timeout_secs(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            dedup_window_secs: default_dedup_window_secs(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_liquidity_eth: default_min_liquidity_eth(),
            max_supply_fraction: default_max_supply_fraction(),
            sentiment_threshold: default_sentiment_threshold(),
            sentiment_keywords: default_sentiment_keywords(),
            sentiment_query_suffix: default_sentiment_query_suffix(),
            ambiguous_revert_policy: AmbiguousRevertPolicy::default(),
            gate_timeout_secs: default_gate_timeout_secs(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            coingecko_url: default_coingecko_url(),
            etherscan_url: default_etherscan_url(),
            etherscan_api_key: default_etherscan_api_key(),
            search_url: default_search_url(),
            google_api_key: default_google_api_key(),
            google_cx: default_google_cx(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            revaluation_interval_secs: default_revaluation_interval_secs(),
            stop_loss_fraction: default_stop_loss_fraction(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log_enabled: true,
            telegram_bot_token: default_telegram_bot_token(),
            telegram_chat_id: default_telegram_chat_id(),
            explorer_tx_url: default_explorer_tx_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            contracts: ContractsConfig::default(),
            backpressure: BackpressureConfig::default(),
            trading: TradingConfig::default(),
            filters: FilterConfig::default(),
            oracle: OracleConfig::default(),
            positions: PositionConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.ws_endpoint", default_ws_endpoint())?
            .set_default("rpc.chain_id", default_chain_id() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SNIPER_)
            .add_source(
                config::Environment::with_prefix("SNIPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Comparisons are written so that NaN fails them
        let trade_amount = self.trading.trade_amount_eth;
        if !(trade_amount > 0.0 && trade_amount.is_finite()) {
            anyhow::bail!("trade_amount_eth must be positive");
        }

        if self.trading.deadline_secs == 0 {
            anyhow::bail!("deadline_secs must be positive");
        }

        if self.trading.submission_timeout_secs == 0 || self.filters.gate_timeout_secs == 0 {
            anyhow::bail!("submission_timeout_secs and gate_timeout_secs must be positive");
        }

        let min_liquidity = self.filters.min_liquidity_eth;
        if !(min_liquidity >= 0.0 && min_liquidity.is_finite()) {
            anyhow::bail!("min_liquidity_eth cannot be negative");
        }

        let max_supply = self.filters.max_supply_fraction;
        if !(max_supply > 0.0 && max_supply <= 1.0) {
            anyhow::bail!("max_supply_fraction must be in (0, 1]");
        }

        let stop_loss = self.positions.stop_loss_fraction;
        if !(stop_loss > 0.0 && stop_loss < 1.0) {
            anyhow::bail!("stop_loss_fraction must be between 0 and 1");
        }

        if self.positions.revaluation_interval_secs == 0 {
            anyhow::bail!("revaluation_interval_secs must be positive");
        }

        if self.backpressure.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be positive");
        }

        // Validate contract addresses
        self.factory_address()?;
        self.router_address()?;
        self.base_asset_address()?;

        if self.filters.sentiment_keywords.is_empty() && self.filters.sentiment_threshold > 0 {
            tracing::warn!("No sentiment keywords configured - the sentiment gate will reject every token");
        }

        Ok(())
    }

    /// Primary websocket endpoint followed by the fallbacks, without repeats
    pub fn ws_endpoints(&self) -> Vec<String> {
        let mut endpoints = vec![self.rpc.ws_endpoint.clone()];
        for endpoint in &self.rpc.fallback_ws_endpoints {
            if !endpoints.contains(endpoint) {
                endpoints.push(endpoint.clone());
            }
        }
        endpoints
    }

    pub fn factory_address(&self) -> Result<Address> {
        parse_address("contracts.factory", &self.contracts.factory)
    }

    pub fn router_address(&self) -> Result<Address> {
        parse_address("contracts.router", &self.contracts.router)
    }

    pub fn base_asset_address(&self) -> Result<Address> {
        parse_address("contracts.base_asset", &self.contracts.base_asset)
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    ws_endpoint: {}
    fallback_endpoints: {}
    chain_id: {}
  Contracts:
    factory: {}
    router: {}
    base_asset: {}
  Trading:
    trade_amount: {} ETH
    fee_tier: {}
    deadline: {}s
    dedup_window: {}s
  Filters:
    min_liquidity: {} ETH
    max_supply_fraction: {}
    sentiment_threshold: {}
    ambiguous_revert_policy: {:?}
  Oracle:
    etherscan_api_key: {}
    google_api_key: {}
  Positions:
    ledger: {}
    revaluation_interval: {}s
    stop_loss: {}%
  Notifications:
    telegram: {}
"#,
            mask_url(&self.rpc.ws_endpoint),
            self.rpc.fallback_ws_endpoints.len(),
            self.rpc.chain_id,
            self.contracts.factory,
            self.contracts.router,
            self.contracts.base_asset,
            self.trading.trade_amount_eth,
            self.trading.fee_tier,
            self.trading.deadline_secs,
            self.trading.dedup_window_secs,
            self.filters.min_liquidity_eth,
            self.filters.max_supply_fraction,
            self.filters.sentiment_threshold,
            self.filters.ambiguous_revert_policy,
            mask_secret(&self.oracle.etherscan_api_key),
            mask_secret(&self.oracle.google_api_key),
            self.positions.ledger_path,
            self.positions.revaluation_interval_secs,
            self.positions.stop_loss_fraction * 100.0,
            if self.notifications.telegram_bot_token.is_empty() {
                "(not set)"
            } else {
                "***"
            },
        )
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .with_context(|| format!("Invalid address for {}: {}", field, value))
}

/// Mask URL for display (hide API keys in paths and query params)
pub(crate) fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        return format!("{}?***", &url[..idx]);
    }
    // Alchemy/Infura style: key is the last path segment
    match url.rsplit_once('/') {
        Some((head, tail)) if tail.len() >= 16 => format!("{}/***", head),
        _ => url.to_string(),
    }
}

fn mask_secret(secret: &str) -> &'static str {
    if secret.is_empty() {
        "(not set)"
    } else {
        "***"
    }
}

/// Operator-adjustable trading knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingSettings {
    pub trade_amount_eth: f64,
    pub min_liquidity_eth: f64,
    pub stop_loss_fraction: f64,
}

/// Point-in-time copy of the runtime settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    pub running: bool,
    pub trading: TradingSettings,
}

/// Process-wide runtime settings shared by the listener, executor and
/// revaluation loop. Writers go through the setters; readers take a
/// [`SettingsSnapshot`] and never hold the lock across an await point.
#[derive(Debug)]
pub struct RuntimeSettings {
    running: AtomicBool,
    trading: RwLock<TradingSettings>,
}

impl RuntimeSettings {
    pub fn new(trading: TradingSettings) -> Self {
        Self {
            running: AtomicBool::new(true),
            trading: RwLock::new(trading),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(TradingSettings {
            trade_amount_eth: config.trading.trade_amount_eth,
            min_liquidity_eth: config.filters.min_liquidity_eth,
            stop_loss_fraction: config.positions.stop_loss_fraction,
        })
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            running: self.is_running(),
            trading: self.trading(),
        }
    }

    pub fn trading(&self) -> TradingSettings {
        match self.trading.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        let was = self.running.swap(running, Ordering::SeqCst);
        if was != running {
            tracing::info!(running, "Operational toggle changed");
        }
    }

    pub fn set_trade_amount(&self, amount_eth: f64) -> crate::error::Result<()> {
        if amount_eth.is_nan() || amount_eth <= 0.0 {
            return Err(crate::error::Error::Config(format!(
                "trade amount must be positive, got {}",
                amount_eth
            )));
        }
        self.update(|t| t.trade_amount_eth = amount_eth);
        tracing::info!(amount_eth, "Trade amount updated");
        Ok(())
    }

    pub fn set_min_liquidity(&self, min_liquidity_eth: f64) -> crate::error::Result<()> {
        if min_liquidity_eth.is_nan() || min_liquidity_eth < 0.0 {
            return Err(crate::error::Error::Config(format!(
                "minimum liquidity cannot be negative, got {}",
                min_liquidity_eth
            )));
        }
        self.update(|t| t.min_liquidity_eth = min_liquidity_eth);
        tracing::info!(min_liquidity_eth, "Minimum liquidity updated");
        Ok(())
    }

    pub fn set_stop_loss(&self, fraction: f64) -> crate::error::Result<()> {
        if fraction.is_nan() || fraction <= 0.0 || fraction >= 1.0 {
            return Err(crate::error::Error::Config(format!(
                "stop-loss fraction must be in (0, 1), got {}",
                fraction
            )));
        }
        self.update(|t| t.stop_loss_fraction = fraction);
        tracing::info!(fraction, "Stop-loss updated");
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut TradingSettings)) {
        let mut guard = match self.trading.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}
