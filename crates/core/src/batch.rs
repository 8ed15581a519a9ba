//! Revoke batches: planning and the per-batch submission state machine.
//!
//! ```text
//! Pending ──► Submitting ──► Confirmed
//!    │            │
//!    └──────► Failed ──(retry)──► Submitting
//! ```
//!
//! Membership is fixed at planning time. Only status, transaction hash, block
//! and error change afterwards.

use crate::error::{Error, Result};
use crate::TokenId;
use alloy::primitives::B256;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchStatus {
    Pending,
    Submitting,
    Confirmed,
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Submitting => "submitting",
            BatchStatus::Confirmed => "confirmed",
            BatchStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position in the plan.
    pub batch_num: usize,
    pub token_ids: Vec<TokenId>,
    pub status: BatchStatus,
    pub tx_hash: Option<B256>,
    pub block_number: Option<u64>,
    pub error: Option<String>,
    /// Number of times submission has started.
    pub attempts: u32,
}

impl Batch {
    fn planned(batch_num: usize, token_ids: Vec<TokenId>) -> Self {
        Self {
            batch_num,
            token_ids,
            status: BatchStatus::Pending,
            tx_hash: None,
            block_number: None,
            error: None,
            attempts: 0,
        }
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            batch: self.batch_num,
            from: self.status,
            action,
        }
    }

    /// Whether a submission may start now.
    pub fn is_submittable(&self) -> bool {
        matches!(self.status, BatchStatus::Pending | BatchStatus::Failed)
    }

    /// Pending or Failed → Submitting. A retry clears the previous attempt's
    /// hash and error but keeps the token list untouched.
    pub fn begin_submit(&mut self) -> Result<()> {
        if !self.is_submittable() {
            return Err(self.invalid("submit"));
        }
        self.status = BatchStatus::Submitting;
        self.tx_hash = None;
        self.block_number = None;
        self.error = None;
        self.attempts += 1;
        Ok(())
    }

    /// Record the hash of the dispatched transaction.
    pub fn record_dispatch(&mut self, tx_hash: B256) -> Result<()> {
        if self.status != BatchStatus::Submitting || self.tx_hash.is_some() {
            return Err(self.invalid("record a dispatch"));
        }
        self.tx_hash = Some(tx_hash);
        Ok(())
    }

    /// Submitting → Confirmed.
    pub fn confirm(&mut self, block_number: u64) -> Result<()> {
        if self.status != BatchStatus::Submitting {
            return Err(self.invalid("confirm"));
        }
        self.status = BatchStatus::Confirmed;
        self.block_number = Some(block_number);
        Ok(())
    }

    /// Pending or Submitting → Failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        if !matches!(self.status, BatchStatus::Pending | BatchStatus::Submitting) {
            return Err(self.invalid("fail"));
        }
        self.status = BatchStatus::Failed;
        self.error = Some(message.into());
        Ok(())
    }
}

/// Partition `token_ids` into consecutive batches of at most `batch_size`,
/// numbered from 1, all Pending.
pub fn plan_batches(token_ids: &[TokenId], batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(Error::ZeroBatchSize);
    }
    Ok(token_ids
        .chunks(batch_size)
        .enumerate()
        .map(|(i, chunk)| Batch::planned(i + 1, chunk.to_vec()))
        .collect())
}
