//! Contract bindings for the factory, pair, token and router

use ethers::abi::{parse_abi, Abi};
use ethers::prelude::*;

// ERC20 reads used by the ownership, supply and sentiment gates.
// `owner()` is not part of ERC20; tokens without it fail the ownership gate.
abigen!(
    IErc20,
    r#"[
        function owner() external view returns (address)
        function totalSupply() external view returns (uint256)
        function balanceOf(address account) external view returns (uint256)
        function symbol() external view returns (string)
    ]"#
);

abigen!(
    IUniswapV2Pair,
    r#"[
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
    ]"#
);

/// `PairCreated(address indexed token0, address indexed token1, address pair, uint256)`
#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "PairCreated", abi = "PairCreated(address,address,address,uint256)")]
pub struct PairCreatedFilter {
    #[ethevent(indexed)]
    pub token0: Address,
    #[ethevent(indexed)]
    pub token1: Address,
    pub pair: Address,
    pub index: U256,
}

/// Tuple layout of `ISwapRouter.ExactInputSingleParams`:
/// tokenIn, tokenOut, fee, recipient, deadline, amountIn, amountOutMinimum, sqrtPriceLimitX96
pub type ExactInputSingleParams = (Address, Address, u32, Address, U256, U256, U256, U256);

/// Pair accessors resolved by name at call time
pub fn pair_tokens_abi() -> Result<Abi, ethers::abi::ParseError> {
    parse_abi(&[
        "function token0() external view returns (address)",
        "function token1() external view returns (address)",
    ])
}

/// Uniswap V3 SwapRouter, `exactInputSingle` only
///
/// The human-readable parser only accepts tuple parameters through a named
/// struct declaration.
pub fn swap_router_abi() -> Result<Abi, ethers::abi::ParseError> {
    parse_abi(&[
        "struct ExactInputSingleParams { address tokenIn; address tokenOut; uint24 fee; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; uint160 sqrtPriceLimitX96; }",
        "function exactInputSingle(ExactInputSingleParams params) external payable returns (uint256 amountOut)",
    ])
}
