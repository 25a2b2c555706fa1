//! Token legitimacy filtering
//!
//! A [`CandidateToken`] runs through [`LegitimacyValidator`], an ordered list
//! of [`Gate`]s that stops at the first rejection.

pub mod gates;
pub mod honeypot;
pub mod liquidity;
pub mod sentiment;
pub mod validator;

use ethers::types::Address;

pub use gates::{Gate, GateKind, GateOutcome};
pub use honeypot::{AmbiguousRevertPolicy, HoneypotSimulator, HoneypotVerdict};
pub use liquidity::LiquidityGate;
pub use validator::{GateFailure, LegitimacyValidator, ValidationReport};

/// Token under evaluation and the pair that announced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateToken {
    pub token: Address,
    pub pair: Address,
}
