//! Position ledger and revaluation

pub mod ledger;
pub mod revaluation;

pub use ledger::{Ledger, LedgerSummary, Position, PositionStatus};
pub use revaluation::{apply_price, CycleStats, Revaluator};
