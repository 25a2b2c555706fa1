//! `eth_call` state overrides that fund the wallet for a simulated swap
//!
//! At the head block the wallet holds none of a freshly listed token and has
//! never approved the router, so a plain `eth_call` of the sell leg always
//! reverts inside `transferFrom`. The overrides below write the wallet's
//! balance and router allowance straight into the token's storage.
//!
//! The storage layout of an arbitrary token is unknown, so every candidate
//! mapping slot is written at once, for both the Solidity
//! (`keccak(key . slot)`) and Vyper (`keccak(slot . key)`) hashing orders.
//! Tokens that keep balances outside a plain mapping (reflection tokens,
//! proxies with shifted layouts) still revert and are judged on that revert.

use ethers::types::spoof;
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

use super::SwapRequest;

/// Mapping slots tried for `balanceOf` and `allowance`
pub const MAPPING_SLOTS: u64 = 16;

/// Native balance added on top of the swap value
const GAS_HEADROOM_WEI: u64 = 1_000_000_000_000_000_000;

/// Overrides that let `wallet` afford `request` through `router`.
///
/// A swap paid in native value only funds the wallet's ETH balance. A swap
/// paid from an ERC20 balance also seeds that token's balance and allowance
/// mappings.
pub fn funding_state(request: &SwapRequest, wallet: Address, router: Address) -> spoof::State {
    let mut state = spoof::state();

    state
        .account(wallet)
        .balance(request.value.saturating_add(U256::from(GAS_HEADROOM_WEI)));

    if request.value < request.amount_in {
        let balance = word(request.amount_in);
        let allowance = word(U256::MAX);
        let token = state.account(request.token_in);
        for slot in 0..MAPPING_SLOTS {
            for key in balance_keys(wallet, slot) {
                token.store(key, balance);
            }
            for key in allowance_keys(wallet, router, slot) {
                token.store(key, allowance);
            }
        }
    }

    state
}

/// Storage keys of `balances[holder]` if the mapping lives at `slot`
pub fn balance_keys(holder: Address, slot: u64) -> [H256; 2] {
    let slot = H256::from_low_u64_be(slot);
    let holder = H256::from(holder);
    [hash_pair(holder, slot), hash_pair(slot, holder)]
}

/// Storage keys of `allowances[owner][spender]` if the mapping lives at `slot`
pub fn allowance_keys(owner: Address, spender: Address, slot: u64) -> [H256; 2] {
    let slot = H256::from_low_u64_be(slot);
    let owner = H256::from(owner);
    let spender = H256::from(spender);

    let solidity = hash_pair(spender, hash_pair(owner, slot));
    let vyper = hash_pair(hash_pair(slot, owner), spender);
    [solidity, vyper]
}

fn hash_pair(a: H256, b: H256) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(a.as_bytes());
    buf[32..].copy_from_slice(b.as_bytes());
    H256(keccak256(buf))
}

fn word(value: U256) -> H256 {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    H256(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};

    const WALLET: Address = Address::repeat_byte(0x11);
    const ROUTER: Address = Address::repeat_byte(0x22);
    const WETH: Address = Address::repeat_byte(0xee);
    const TOKEN: Address = Address::repeat_byte(0x70);

    fn request(token_in: Address, token_out: Address, value: U256) -> SwapRequest {
        SwapRequest {
            token_in,
            token_out,
            fee: 3000,
            recipient: WALLET,
            deadline: U256::from(1_700_000_000u64),
            amount_in: U256::exp10(16),
            amount_out_minimum: U256::zero(),
            value,
        }
    }

    #[test]
    fn test_balance_key_matches_solidity_mapping_layout() {
        // keccak256(abi.encode(holder, uint256(3)))
        let expected = H256(keccak256(encode(&[
            Token::Address(WALLET),
            Token::Uint(U256::from(3u64)),
        ])));
        assert_eq!(balance_keys(WALLET, 3)[0], expected);
    }

    #[test]
    fn test_allowance_key_matches_nested_mapping_layout() {
        let inner = keccak256(encode(&[Token::Address(WALLET), Token::Uint(U256::one())]));
        let expected = H256(keccak256(encode(&[
            Token::Address(ROUTER),
            Token::FixedBytes(inner.to_vec()),
        ])));
        assert_eq!(allowance_keys(WALLET, ROUTER, 1)[0], expected);
    }

    #[test]
    fn test_native_buy_only_funds_eth_balance() {
        let buy = request(WETH, TOKEN, U256::exp10(16));
        let mut state = funding_state(&buy, WALLET, ROUTER);

        assert!(state.account(WALLET).balance.unwrap() > buy.value);
        assert!(state.account(WETH).storage.is_none());
    }

    #[test]
    fn test_token_sell_seeds_balance_and_allowance() {
        let sell = request(TOKEN, WETH, U256::zero());
        let mut state = funding_state(&sell, WALLET, ROUTER);

        let storage = state.account(TOKEN).storage.clone().unwrap();
        assert_eq!(storage.len(), (MAPPING_SLOTS * 4) as usize);
        assert_eq!(storage.get(&balance_keys(WALLET, 0)[0]), Some(&word(sell.amount_in)));
        assert_eq!(
            storage.get(&allowance_keys(WALLET, ROUTER, 1)[0]),
            Some(&word(U256::MAX))
        );
        assert!(matches!(storage, spoof::Storage::Diff(_)));
    }
}
