//! Error types shared by the read and write pipelines.

use crate::batch::BatchStatus;
use alloy::primitives::B256;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport or node failure. A strict aggregate whose inner call reverts
    /// surfaces here too, because the aggregator reverts the whole read.
    #[error("rpc: {0}")]
    Rpc(String),

    /// The aggregator reported a failed inner call that was issued with
    /// `allowFailure = false`.
    #[error("aggregated call {index} reverted and failure was not allowed")]
    StrictCallReverted { index: usize },

    #[error("aggregator returned {got} results for {expected} calls")]
    ResultCountMismatch { expected: usize, got: usize },

    /// Returned bytes do not match the expected output shape.
    #[error("decode {function}: {reason}")]
    Decode {
        function: &'static str,
        reason: String,
    },

    /// Signing or broadcast of a mutating transaction failed.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// The transaction outcome could not be observed.
    #[error("confirmation failed: {0}")]
    Confirmation(String),

    #[error("transaction {tx} reverted in block {block}")]
    Reverted { tx: B256, block: u64 },

    #[error("batch {batch}: cannot {action} while {from}")]
    InvalidTransition {
        batch: usize,
        from: BatchStatus,
        action: &'static str,
    },

    #[error("no batch numbered {0}")]
    UnknownBatch(usize),

    #[error("batches have left pending; re-planning would lose their state")]
    PlanLocked,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("page size must be at least 1")]
    ZeroPageSize,
}

impl Error {
    pub fn decode(function: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Decode {
            function,
            reason: err.to_string(),
        }
    }
}
