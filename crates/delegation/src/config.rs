//! Sweep settings and their defaults.

use crate::error::{Error, Result};
use alloy::primitives::{address, Address};
use std::path::PathBuf;
use std::time::Duration;

/// Entries per aggregated read.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Token ids per revoke transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_CHECKPOINT: &str = "delegated_tokens.txt";
pub const DEFAULT_RPC_URL: &str = "https://api.roninchain.com/rpc";
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Deployed contracts the sweep talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contracts {
    pub collection: Address,
    pub multicall: Address,
    pub registry: Address,
}

impl Default for Contracts {
    /// Ronin mainnet deployments.
    fn default() -> Self {
        Self {
            collection: address!("0x32950db2a7164ae833121501c797d79e7b79d74c"),
            multicall: address!("0xcA11bde05977b3631167028862bE2a173976CA11"),
            registry: address!("0xd6d11474eb323521ada927f14a4b839b90009ac8"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub contracts: Contracts,
    pub page_size: usize,
    pub batch_size: usize,
    pub checkpoint: PathBuf,
    pub receipt_timeout: Duration,
    /// Fail the ownership pass on any per-index lookup failure instead of
    /// skipping the index.
    pub strict_ownership: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            contracts: Contracts::default(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            strict_ownership: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page size must be at least 1".into()));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(Error::Config(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        Ok(())
    }
}
