//! Durable trade ledger
//!
//! The ledger is a JSON array of [`Position`]s in execution order. The file
//! is the source of truth: every operation re-reads it, and every mutation
//! rewrites it through a temp file in the same directory followed by a
//! rename, all under one async mutex.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ethers::types::{Address, TxHash};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    /// Terminal; closed positions are never revalued
    Closed,
}

/// One executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub token_address: Address,
    pub tx_hash: TxHash,
    /// Base-asset units spent
    pub amount_invested: f64,
    /// Fiat value at entry
    pub value_at_trade: f64,
    pub current_value: Option<f64>,
    pub profit_loss: Option<f64>,
    pub status: PositionStatus,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn open(token_address: Address, tx_hash: TxHash, amount_invested: f64, value_at_trade: f64) -> Self {
        Self {
            token_address,
            tx_hash,
            amount_invested,
            value_at_trade,
            current_value: None,
            profit_loss: None,
            status: PositionStatus::Open,
            timestamp: Utc::now(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Aggregate view over the whole ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    /// Positions with a strictly positive profit/loss
    pub profitable: usize,
    /// Everything else, including positions not yet revalued
    pub unprofitable: usize,
    pub net_profit_loss: f64,
}

impl LedgerSummary {
    pub fn from_positions(positions: &[Position]) -> Self {
        let open = positions.iter().filter(|p| p.is_open()).count();
        let profitable = positions
            .iter()
            .filter(|p| p.profit_loss.is_some_and(|pl| pl > 0.0))
            .count();

        Self {
            total: positions.len(),
            open,
            closed: positions.len() - open,
            profitable,
            unprofitable: positions.len() - profitable,
            net_profit_loss: positions.iter().filter_map(|p| p.profit_loss).sum(),
        }
    }
}

/// File-backed position ledger with a single-writer critical section
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Ledger {
    /// Open the ledger at `path`, creating it as `[]` if missing.
    ///
    /// An existing file must parse; a corrupt ledger is never overwritten.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = Self {
            path,
            lock: Mutex::new(()),
        };

        let guard = ledger.lock.lock().await;
        if tokio::fs::try_exists(&ledger.path).await? {
            let positions = read_positions(&ledger.path).await?;
            info!("Loaded {} positions from {}", positions.len(), ledger.path.display());
        } else {
            write_positions(&ledger.path, &[]).await?;
            info!("Created empty ledger at {}", ledger.path.display());
        }
        drop(guard);

        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of every position
    pub async fn positions(&self) -> Result<Vec<Position>> {
        let _guard = self.lock.lock().await;
        read_positions(&self.path).await
    }

    pub async fn open_positions(&self) -> Result<Vec<Position>> {
        Ok(self.positions().await?.into_iter().filter(Position::is_open).collect())
    }

    pub async fn append(&self, position: Position) -> Result<()> {
        let token = position.token_address;
        self.update(move |positions| positions.push(position)).await?;
        debug!(token = ?token, "Position appended");
        Ok(())
    }

    /// Read-modify-write under the ledger lock.
    ///
    /// On any error the file keeps its previous contents.
    pub async fn update<T>(&self, f: impl FnOnce(&mut Vec<Position>) -> T) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut positions = read_positions(&self.path).await?;
        let out = f(&mut positions);
        write_positions(&self.path, &positions).await?;
        Ok(out)
    }
}

async fn read_positions(path: &Path) -> Result<Vec<Position>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::LedgerIo(format!("{}: {}", path.display(), e)))?;

    if data.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&data).map_err(|e| Error::LedgerCorrupt(format!("{}: {}", path.display(), e)))
}

async fn write_positions(path: &Path, positions: &[Position]) -> Result<()> {
    let data = serde_json::to_vec_pretty(positions)?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomic(&path, &data))
        .await
        .map_err(|e| Error::Internal(format!("ledger writer task failed: {}", e)))?
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let io_err = |e: std::io::Error| Error::LedgerIo(format!("{}: {}", path.display(), e));

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(data).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
