//! Batched on-chain discovery-and-mutation primitives.
//!
//! Chain-agnostic building blocks for sweeping a large token set:
//!
//! - **Chain traits**: [`ChainReader`], [`ChainWriter`] and [`FeeOracle`], the
//!   collaborators the pipeline drives
//! - **Multicall**: paged `aggregate3` reads with per-entry success flags
//! - **Batch**: fixed-membership revoke batches and their status machine
//! - **BatchBoard**: shared batch list with watch-based transition updates
//! - **Fees**: EIP-1559 bids derived fresh before every submission

pub mod batch;
pub mod board;
pub mod chain;
pub mod error;
pub mod fees;
pub mod multicall;

pub use batch::{plan_batches, Batch, BatchStatus};
pub use board::{BatchBoard, BoardSummary};
pub use chain::{read_call, BoxFuture, ChainReader, ChainWriter, FeeOracle, TxReceipt};
pub use error::{Error, Result};
pub use fees::{estimate_fees, FeeBid, FeeInputs};
pub use multicall::{page_ranges, AggregatedCall, AggregatedResult, Lookup, Multicall};

/// Identifier of one token in a collection.
pub type TokenId = alloy::primitives::U256;
