//! The read half of the sweep: ownership, then delegation status.

use crate::classify::{Classification, DelegationClassifier};
use crate::config::Settings;
use crate::enumerate::{OwnedTokens, OwnershipEnumerator};
use crate::error::Result;
use alloy::primitives::Address;
use bulk_revoke_core::{ChainReader, TokenId};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    pub owner: Address,
    /// Cutoff used for every active/expired decision in this scan.
    pub now: u64,
    pub owned: OwnedTokens,
    pub classification: Classification,
}

impl ScanReport {
    /// Tokens to revoke: active grants first, then expired ones.
    pub fn delegated(&self) -> Vec<TokenId> {
        self.classification.delegated()
    }
}

/// Enumerate `owner`'s tokens and classify their delegations against `now`.
pub async fn scan<R: ChainReader + ?Sized>(
    reader: &R,
    settings: &Settings,
    owner: Address,
    now: u64,
) -> Result<ScanReport> {
    let owned = OwnershipEnumerator::new(settings).run(reader, owner).await?;
    let classification = DelegationClassifier::new(settings)
        .run(reader, &owned.token_ids, now)
        .await?;
    Ok(ScanReport {
        owner,
        now,
        owned,
        classification,
    })
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
