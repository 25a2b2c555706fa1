//! In-memory fakes shared by unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};

use crate::chain::{ChainClient, PairReserves, SimulationError, SwapReceipt, SwapRequest};
use crate::config::TradingSettings;
use crate::error::{Error, Result};
use crate::filter::CandidateToken;
use crate::notify::{Notification, Notifier};
use crate::oracle::{Oracle, SearchHit, Verification};

pub const WETH: Address = Address::repeat_byte(0xee);
pub const TOKEN: Address = Address::repeat_byte(0x70);
pub const PAIR: Address = Address::repeat_byte(0x9a);
pub const WALLET: Address = Address::repeat_byte(0x11);

pub fn candidate() -> CandidateToken {
    CandidateToken { token: TOKEN, pair: PAIR }
}

pub fn settings(trade_amount_eth: f64, min_liquidity_eth: f64) -> TradingSettings {
    TradingSettings {
        trade_amount_eth,
        min_liquidity_eth,
        stop_loss_fraction: 0.2,
    }
}

/// Chain whose defaults pass every gate
pub fn passing_chain() -> Arc<FakeChain> {
    Arc::new(FakeChain::new())
}

/// Oracle with verified source and two positive search hits
pub fn passing_oracle() -> Arc<FakeOracle> {
    let oracle = FakeOracle::new();
    oracle.set_verification(Verification {
        verified: true,
        contract_name: Some("TestToken".into()),
    });
    oracle.set_hits(vec![
        SearchHit {
            title: "TEST to the moon".into(),
            snippet: "community is bullish".into(),
        },
        SearchHit {
            title: "Rocket launch".into(),
            snippet: String::new(),
        },
        SearchHit {
            title: "Tokenomics".into(),
            snippet: "fair launch".into(),
        },
    ]);
    Arc::new(oracle)
}

struct ChainState {
    reserves: PairReserves,
    owner: Address,
    total_supply: U256,
    wallet_balance: U256,
    symbol: Option<String>,
    simulations: VecDeque<std::result::Result<U256, SimulationError>>,
    simulated: Vec<SwapRequest>,
    submitted: Vec<SwapRequest>,
    submit_error: Option<String>,
    receipt: Option<SwapReceipt>,
}

pub struct FakeChain {
    state: Mutex<ChainState>,
    hang_receipts: AtomicBool,
    hang_submissions: AtomicBool,
    next_tx: AtomicU64,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                reserves: PairReserves {
                    token0: TOKEN,
                    token1: WETH,
                    reserve0: U256::exp10(24),
                    reserve1: U256::exp10(18),
                },
                owner: Address::zero(),
                total_supply: U256::exp10(24),
                wallet_balance: U256::zero(),
                symbol: Some("TEST".into()),
                simulations: VecDeque::new(),
                simulated: Vec::new(),
                submitted: Vec::new(),
                submit_error: None,
                receipt: None,
            }),
            hang_receipts: AtomicBool::new(false),
            hang_submissions: AtomicBool::new(false),
            next_tx: AtomicU64::new(1),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_reserves(&self, reserves: PairReserves) {
        self.state().reserves = reserves;
    }

    pub fn set_owner(&self, owner: Address) {
        self.state().owner = owner;
    }

    pub fn set_supply(&self, total_supply: U256, wallet_balance: U256) {
        let mut state = self.state();
        state.total_supply = total_supply;
        state.wallet_balance = wallet_balance;
    }

    pub fn set_symbol(&self, symbol: Option<String>) {
        self.state().symbol = symbol;
    }

    /// Queue the result of the next simulation; an empty queue simulates success
    pub fn push_simulation(&self, result: std::result::Result<U256, SimulationError>) {
        self.state().simulations.push_back(result);
    }

    pub fn clear_simulations(&self) {
        self.state().simulations.clear();
    }

    pub fn fail_submission(&self, message: &str) {
        self.state().submit_error = Some(message.to_string());
    }

    pub fn set_receipt(&self, receipt: SwapReceipt) {
        self.state().receipt = Some(receipt);
    }

    pub fn hang_receipts(&self) {
        self.hang_receipts.store(true, Ordering::SeqCst);
    }

    /// Submissions never return, like a wedged websocket request
    pub fn hang_submissions(&self) {
        self.hang_submissions.store(true, Ordering::SeqCst);
    }

    pub fn simulated_requests(&self) -> Vec<SwapRequest> {
        self.state().simulated.clone()
    }

    pub fn submitted_requests(&self) -> Vec<SwapRequest> {
        self.state().submitted.clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn wallet_address(&self) -> Address {
        WALLET
    }

    async fn pair_reserves(&self, _pair: Address) -> Result<PairReserves> {
        Ok(self.state().reserves)
    }

    async fn token_owner(&self, _token: Address) -> Result<Address> {
        Ok(self.state().owner)
    }

    async fn total_supply(&self, _token: Address) -> Result<U256> {
        Ok(self.state().total_supply)
    }

    async fn balance_of(&self, _token: Address, _holder: Address) -> Result<U256> {
        Ok(self.state().wallet_balance)
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        self.state()
            .symbol
            .clone()
            .ok_or_else(|| Error::ContractCall(format!("symbol() on {:?}: execution reverted", token)))
    }

    async fn simulate_swap(&self, request: &SwapRequest) -> std::result::Result<U256, SimulationError> {
        let mut state = self.state();
        state.simulated.push(request.clone());
        state
            .simulations
            .pop_front()
            .unwrap_or_else(|| Ok(request.amount_in.max(U256::one())))
    }

    async fn submit_swap(&self, request: &SwapRequest) -> Result<TxHash> {
        if self.hang_submissions.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }

        let mut state = self.state();
        if let Some(message) = &state.submit_error {
            return Err(Error::TransactionSend(message.clone()));
        }
        state.submitted.push(request.clone());
        Ok(TxHash::from_low_u64_be(self.next_tx.fetch_add(1, Ordering::SeqCst)))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<SwapReceipt> {
        if self.hang_receipts.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }

        let receipt = self.state().receipt.clone();
        Ok(receipt.unwrap_or(SwapReceipt {
            tx_hash,
            block_number: Some(1),
            success: true,
            gas_used: Some(U256::from(150_000u64)),
        }))
    }
}

#[derive(Default)]
struct OracleState {
    prices: HashMap<Address, Option<f64>>,
    verification: Verification,
    hits: Vec<SearchHit>,
    queries: Vec<String>,
}

pub struct FakeOracle {
    state: Mutex<OracleState>,
    price_calls: AtomicUsize,
    verification_calls: AtomicUsize,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OracleState::default()),
            price_calls: AtomicUsize::new(0),
            verification_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_price(&self, token: Address, price: Option<f64>) {
        self.state.lock().unwrap().prices.insert(token, price);
    }

    pub fn set_verification(&self, verification: Verification) {
        self.state.lock().unwrap().verification = verification;
    }

    pub fn set_hits(&self, hits: Vec<SearchHit>) {
        self.state.lock().unwrap().hits = hits;
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn verification_calls(&self) -> usize {
        self.verification_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    /// Unknown tokens fail like an unreachable API would
    async fn price(&self, token: Address) -> Result<Option<f64>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .prices
            .get(&token)
            .copied()
            .ok_or_else(|| Error::Oracle("503 Service Unavailable".into()))
    }

    async fn verification(&self, _token: Address) -> Result<Verification> {
        self.verification_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().verification.clone())
    }

    async fn sentiment(&self, query: &str) -> Result<Vec<SearchHit>> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());
        Ok(state.hits.clone())
    }
}

pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_deliveries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Notification("chat not found".into()));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
