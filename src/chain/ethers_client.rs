//! [`ChainClient`] backed by an ethers middleware stack

use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::RawCall;
use tracing::{debug, info, warn};

use super::contracts::{pair_tokens_abi, swap_router_abi, ExactInputSingleParams, IErc20, IUniswapV2Pair};
use super::funding::funding_state;
use super::{classify_call_failure, ChainClient, PairReserves, SimulationError, SwapReceipt, SwapRequest};
use crate::config::{mask_url, Config};
use crate::error::{Error, Result};

/// Signing client over a reconnecting websocket
pub type WsSigner = SignerMiddleware<Provider<Ws>, LocalWallet>;

/// Websocket reconnect attempts before the provider gives up
const WS_RECONNECTS: usize = 10;

/// Read the trading key from `WALLET_PRIVATE_KEY`
pub fn load_wallet(chain_id: u64) -> Result<LocalWallet> {
    let key = std::env::var("WALLET_PRIVATE_KEY")
        .map_err(|_| Error::MissingEnvVar("WALLET_PRIVATE_KEY".into()))?;

    let wallet = key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| Error::InvalidKey(e.to_string()))?;

    Ok(wallet.with_chain_id(chain_id))
}

/// Connect the signing client used for reads, simulation and submission.
///
/// Endpoints are tried in order (primary, then fallbacks); the first one
/// that answers on the configured chain is used.
pub async fn connect(config: &Config, wallet: LocalWallet) -> Result<EthersChain<WsSigner>> {
    let mut last_error = Error::Config("no websocket endpoint configured".into());
    let mut connected = None;

    for endpoint in config.ws_endpoints() {
        match connect_endpoint(&endpoint, config.rpc.chain_id).await {
            Ok(provider) => {
                info!(endpoint = %mask_url(&endpoint), "RPC connected");
                connected = Some(provider);
                break;
            }
            Err(e) => {
                warn!(endpoint = %mask_url(&endpoint), error = %e, "RPC endpoint unavailable");
                last_error = e;
            }
        }
    }

    let Some(provider) = connected else {
        return Err(last_error);
    };

    let address = wallet.address();
    let router = config.router_address().map_err(|e| Error::InvalidAddress(e.to_string()))?;
    let client = Arc::new(SignerMiddleware::new(provider, wallet));

    EthersChain::new(
        client,
        address,
        router,
        config.trading.gas_limit,
        config.rpc.confirmations,
    )
}

async fn connect_endpoint(endpoint: &str, chain_id: u64) -> Result<Provider<Ws>> {
    let provider = Provider::<Ws>::connect_with_reconnects(endpoint, WS_RECONNECTS)
        .await
        .map_err(|e| Error::RpcConnection(e.to_string()))?;

    let remote = provider.get_chainid().await?;
    if remote.as_u64() != chain_id {
        return Err(Error::Config(format!(
            "endpoint is on chain {}, configured chain_id is {}",
            remote, chain_id
        )));
    }

    Ok(provider)
}

/// Production chain client
///
/// `M` is normally `SignerMiddleware<Provider<Ws>, LocalWallet>`, so reads,
/// `eth_call` simulation and signed submission share one websocket.
pub struct EthersChain<M: Middleware> {
    client: Arc<M>,
    wallet: Address,
    router: Contract<M>,
    pair_abi: BaseContract,
    gas_limit: U256,
    confirmations: usize,
}

impl<M: Middleware + 'static> EthersChain<M> {
    pub fn new(
        client: Arc<M>,
        wallet: Address,
        router: Address,
        gas_limit: u64,
        confirmations: usize,
    ) -> Result<Self> {
        let router_abi = swap_router_abi()
            .map_err(|e| Error::Internal(format!("router ABI: {}", e)))?;
        let pair_abi = pair_tokens_abi()
            .map_err(|e| Error::Internal(format!("pair ABI: {}", e)))?;

        Ok(Self {
            router: Contract::new(router, router_abi, client.clone()),
            client,
            wallet,
            pair_abi: BaseContract::from(pair_abi),
            gas_limit: U256::from(gas_limit),
            confirmations: confirmations.max(1),
        })
    }

    fn swap_call(&self, request: &SwapRequest) -> Result<ContractCall<M, U256>> {
        let params: ExactInputSingleParams = (
            request.token_in,
            request.token_out,
            request.fee,
            request.recipient,
            request.deadline,
            request.amount_in,
            request.amount_out_minimum,
            U256::zero(),
        );

        let call = self
            .router
            .method::<_, U256>("exactInputSingle", (params,))
            .map_err(|e| Error::Internal(format!("exactInputSingle encoding: {}", e)))?
            .from(self.wallet)
            .value(request.value)
            .gas(self.gas_limit);

        Ok(call)
    }

    async fn pair_token(&self, pair: Address, name: &str) -> Result<Address> {
        let contract = Contract::new(pair, self.pair_abi.clone(), self.client.clone());
        contract
            .method::<_, Address>(name, ())
            .map_err(|e| Error::Internal(format!("{} encoding: {}", name, e)))?
            .call()
            .await
            .map_err(|e| Error::ContractCall(format!("{}() on {:?}: {}", name, pair, e)))
    }

    fn erc20(&self, token: Address) -> IErc20<M> {
        IErc20::new(token, self.client.clone())
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainClient for EthersChain<M> {
    fn wallet_address(&self) -> Address {
        self.wallet
    }

    async fn pair_reserves(&self, pair: Address) -> Result<PairReserves> {
        let contract = IUniswapV2Pair::new(pair, self.client.clone());
        let (reserve0, reserve1, _) = contract
            .get_reserves()
            .call()
            .await
            .map_err(|e| Error::ContractCall(format!("getReserves() on {:?}: {}", pair, e)))?;

        let token0 = self.pair_token(pair, "token0").await?;
        let token1 = self.pair_token(pair, "token1").await?;

        Ok(PairReserves {
            token0,
            token1,
            reserve0: U256::from(reserve0),
            reserve1: U256::from(reserve1),
        })
    }

    async fn token_owner(&self, token: Address) -> Result<Address> {
        self.erc20(token)
            .owner()
            .call()
            .await
            .map_err(|e| Error::ContractCall(format!("owner() on {:?}: {}", token, e)))
    }

    async fn total_supply(&self, token: Address) -> Result<U256> {
        self.erc20(token)
            .total_supply()
            .call()
            .await
            .map_err(|e| Error::ContractCall(format!("totalSupply() on {:?}: {}", token, e)))
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        self.erc20(token)
            .balance_of(holder)
            .call()
            .await
            .map_err(|e| Error::ContractCall(format!("balanceOf() on {:?}: {}", token, e)))
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        self.erc20(token)
            .symbol()
            .call()
            .await
            .map_err(|e| Error::ContractCall(format!("symbol() on {:?}: {}", token, e)))
    }

    async fn simulate_swap(&self, request: &SwapRequest) -> std::result::Result<U256, SimulationError> {
        let call = self
            .swap_call(request)
            .map_err(|e| SimulationError::Transport(e.to_string()))?;

        let state = funding_state(request, self.wallet, self.router.address());

        match call.call_raw().state(&state).await {
            Ok(amount_out) => {
                debug!(
                    token_in = ?request.token_in,
                    token_out = ?request.token_out,
                    %amount_out,
                    "Swap simulation succeeded"
                );
                Ok(amount_out)
            }
            Err(err) => {
                let revert_data = err.as_revert().map(|data| data.to_vec());
                let reason = err.decode_revert::<String>();
                Err(classify_call_failure(&err.to_string(), revert_data.as_deref(), reason))
            }
        }
    }

    async fn submit_swap(&self, request: &SwapRequest) -> Result<TxHash> {
        let call = self.swap_call(request)?;
        let pending = call
            .send()
            .await
            .map_err(|e| Error::TransactionSend(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<SwapReceipt> {
        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(self.confirmations)
            .await?;

        let Some(receipt) = receipt else {
            warn!(tx_hash = ?tx_hash, "Transaction dropped before confirmation");
            return Err(Error::TransactionSend(format!(
                "transaction {:?} dropped from mempool",
                tx_hash
            )));
        };

        Ok(SwapReceipt {
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            success: receipt.status == Some(U64::from(1u64)),
            gas_used: receipt.gas_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::providers::{JsonRpcError, MockProvider, MockResponse};

    const WALLET: Address = Address::repeat_byte(0x11);
    const ROUTER: Address = Address::repeat_byte(0x22);
    const WETH: Address = Address::repeat_byte(0xee);
    const TOKEN: Address = Address::repeat_byte(0x70);

    fn mocked_chain() -> (EthersChain<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let chain = EthersChain::new(Arc::new(provider), WALLET, ROUTER, 300_000, 1).unwrap();
        (chain, mock)
    }

    fn sell_request() -> SwapRequest {
        SwapRequest {
            token_in: TOKEN,
            token_out: WETH,
            fee: 3000,
            recipient: WALLET,
            deadline: U256::from(1_700_000_000u64),
            amount_in: U256::exp10(21),
            amount_out_minimum: U256::zero(),
            value: U256::zero(),
        }
    }

    #[test]
    fn test_swap_call_encodes_exact_input_single() {
        let (chain, _mock) = mocked_chain();
        let request = SwapRequest {
            token_in: WETH,
            token_out: TOKEN,
            value: U256::exp10(16),
            amount_in: U256::exp10(16),
            ..sell_request()
        };

        let call = chain.swap_call(&request).unwrap();

        assert_eq!(call.tx.to(), Some(&NameOrAddress::Address(ROUTER)));
        assert_eq!(call.tx.from(), Some(&WALLET));
        assert_eq!(call.tx.value(), Some(&request.value));
        assert_eq!(call.tx.gas(), Some(&U256::from(300_000u64)));

        let data = call.tx.data().unwrap();
        assert_eq!(&data[..4], &[0x41, 0x4b, 0xf3, 0x89]);
        assert_eq!(data.len(), 4 + 8 * 32);

        let word = |i: usize| U256::from_big_endian(&data[4 + i * 32..4 + (i + 1) * 32]);
        assert_eq!(word(2), U256::from(3000u64));
        assert_eq!(word(5), request.amount_in);
        assert!(word(6).is_zero());
        assert!(word(7).is_zero());
    }

    #[tokio::test]
    async fn test_simulate_swap_decodes_quote() {
        let (chain, mock) = mocked_chain();
        let quoted = U256::from(123_456u64);
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(quoted)]))).unwrap();

        assert_eq!(chain.simulate_swap(&sell_request()).await, Ok(quoted));
    }

    #[tokio::test]
    async fn test_simulate_swap_reports_revert_reason() {
        let (chain, mock) = mocked_chain();
        let mut revert = vec![0x08, 0xc3, 0x79, 0xa0];
        revert.extend(encode(&[Token::String("TRANSFER_FROM_FAILED".into())]));
        mock.push_response(MockResponse::Error(JsonRpcError {
            code: 3,
            message: "execution reverted: TRANSFER_FROM_FAILED".into(),
            data: Some(serde_json::to_value(Bytes::from(revert)).unwrap()),
        }));

        assert_eq!(
            chain.simulate_swap(&sell_request()).await,
            Err(SimulationError::Reverted("TRANSFER_FROM_FAILED".into()))
        );
    }
}
