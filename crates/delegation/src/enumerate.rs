//! Ownership enumeration: page through an owner's token indices.

use crate::config::Settings;
use crate::contracts::IERC721Enumerable;
use crate::error::Result;
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use bulk_revoke_core::{
    page_ranges, read_call, AggregatedCall, ChainReader, Error as ChainError, Lookup, Multicall,
    TokenId,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Largest balance taken at face value. Anything above it is not a wallet an
/// ERC-721 collection can report, so the contract is not one.
const MAX_BALANCE: u64 = u32::MAX as u64;

/// Token ids resolved for one owner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnedTokens {
    /// Balance reported by the collection at the start of the pass.
    pub balance: usize,
    /// Resolved ids in index order, without repeats.
    pub token_ids: Vec<TokenId>,
    /// Indices whose lookup reverted.
    pub failed: usize,
    /// Indices whose lookup returned bytes that are not a token id.
    pub malformed: usize,
    /// Ids reported again at a later index.
    pub duplicates: usize,
}

impl OwnedTokens {
    pub fn skipped(&self) -> usize {
        self.failed + self.malformed + self.duplicates
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OwnershipEnumerator {
    collection: Address,
    multicall: Multicall,
    page_size: usize,
    strict: bool,
}

impl OwnershipEnumerator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            collection: settings.contracts.collection,
            multicall: Multicall::new(settings.contracts.multicall),
            page_size: settings.page_size,
            strict: settings.strict_ownership,
        }
    }

    /// Resolve every token `owner` holds, one aggregated read per page.
    ///
    /// A failed `balanceOf` aborts the pass. A failed index lookup is dropped
    /// unless the enumerator is strict, in which case it aborts the pass too.
    pub async fn run<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
        owner: Address,
    ) -> Result<OwnedTokens> {
        let balance = read_call(
            reader,
            self.collection,
            IERC721Enumerable::balanceOfCall { owner },
        )
        .await?;
        let count = u64::try_from(balance)
            .ok()
            .filter(|&b| b <= MAX_BALANCE)
            .and_then(|b| usize::try_from(b).ok())
            .ok_or_else(|| {
                ChainError::decode(
                    IERC721Enumerable::balanceOfCall::SIGNATURE,
                    format!("balance {balance} is out of range"),
                )
            })?;

        let mut owned = OwnedTokens {
            balance: count,
            ..Default::default()
        };
        if count == 0 {
            info!(%owner, "no tokens found");
            return Ok(owned);
        }

        info!(%owner, count, "fetching token ids");
        let mut seen = HashSet::with_capacity(count.min(self.page_size));
        for page in page_ranges(count, self.page_size)? {
            let calls: Vec<AggregatedCall> = page
                .clone()
                .map(|index| {
                    let call = IERC721Enumerable::tokenOfOwnerByIndexCall {
                        owner,
                        index: U256::from(index),
                    };
                    if self.strict {
                        AggregatedCall::strict(self.collection, &call)
                    } else {
                        AggregatedCall::lenient(self.collection, &call)
                    }
                })
                .collect();
            let results = self.multicall.aggregate(reader, &calls).await?;

            for (index, result) in page.zip(results) {
                match result.decode::<IERC721Enumerable::tokenOfOwnerByIndexCall>() {
                    Lookup::Found(token_id) => {
                        if seen.insert(token_id) {
                            owned.token_ids.push(token_id);
                        } else {
                            debug!(index, %token_id, "token id repeated at a later index");
                            owned.duplicates += 1;
                        }
                    }
                    Lookup::Failed => {
                        debug!(index, "token index lookup failed");
                        owned.failed += 1;
                    }
                    Lookup::Malformed(e) if self.strict => return Err(e.into()),
                    Lookup::Malformed(e) => {
                        debug!(index, error = %e, "token index lookup undecodable");
                        owned.malformed += 1;
                    }
                }
            }
            debug!(fetched = owned.token_ids.len(), total = count, "page done");
        }

        if owned.skipped() > 0 {
            warn!(
                failed = owned.failed,
                malformed = owned.malformed,
                duplicates = owned.duplicates,
                "some token indices were skipped"
            );
        }
        info!(found = owned.token_ids.len(), "token ids fetched");
        Ok(owned)
    }
}
