//! Delegation classification: which owned tokens carry a delegation grant.

use crate::config::Settings;
use crate::contracts::{IDelegationRegistry, NO_DELEGATEE};
use crate::error::Result;
use alloy::primitives::Address;
use bulk_revoke_core::{page_ranges, AggregatedCall, ChainReader, Lookup, Multicall, TokenId};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DelegationClass {
    None,
    Active,
    Expired,
}

impl DelegationClass {
    /// A grant is active only while its expiry lies strictly after `now`.
    pub fn of(delegatee: Address, expiry_ts: u64, now: u64) -> Self {
        if delegatee == NO_DELEGATEE {
            DelegationClass::None
        } else if expiry_ts > now {
            DelegationClass::Active
        } else {
            DelegationClass::Expired
        }
    }
}

/// A decoded `getDelegationInfo` answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelegationInfo {
    pub delegatee: Address,
    pub delegated_at: u64,
    pub expiry_ts: u64,
    pub permission_bitmap: u64,
}

impl DelegationInfo {
    pub fn class(&self, now: u64) -> DelegationClass {
        DelegationClass::of(self.delegatee, self.expiry_ts, now)
    }
}

impl From<IDelegationRegistry::getDelegationInfoReturn> for DelegationInfo {
    fn from(ret: IDelegationRegistry::getDelegationInfoReturn) -> Self {
        Self {
            delegatee: ret.delegatee,
            delegated_at: ret.info.delegatedAt,
            expiry_ts: ret.info.expiryTs,
            permission_bitmap: ret.info.permissionBitMap,
        }
    }
}

/// Outcome of one classification pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    /// Tokens with an unexpired grant, in input order.
    pub active: Vec<TokenId>,
    /// Tokens with a lapsed grant still on record, in input order.
    pub expired: Vec<TokenId>,
    /// Tokens without a delegatee.
    pub none: usize,
    /// Lookups that reverted.
    pub failed: usize,
    /// Lookups that succeeded with an undecodable answer.
    pub malformed: usize,
}

impl Classification {
    /// Active tokens first, then expired ones.
    pub fn delegated(&self) -> Vec<TokenId> {
        self.active.iter().chain(&self.expired).copied().collect()
    }

    pub fn checked(&self) -> usize {
        self.active.len() + self.expired.len() + self.none + self.failed + self.malformed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DelegationClassifier {
    registry: Address,
    multicall: Multicall,
    page_size: usize,
}

impl DelegationClassifier {
    pub fn new(settings: &Settings) -> Self {
        Self {
            registry: settings.contracts.registry,
            multicall: Multicall::new(settings.contracts.multicall),
            page_size: settings.page_size,
        }
    }

    /// Classify each token once against the single cutoff `now`.
    ///
    /// Lookups that fail or do not decode are counted and left out of both
    /// lists; they never abort the pass.
    pub async fn run<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
        token_ids: &[TokenId],
        now: u64,
    ) -> Result<Classification> {
        let mut classification = Classification::default();
        let total = token_ids.len();

        for page in page_ranges(total, self.page_size)? {
            let checked = page.end;
            let ids = &token_ids[page];
            let calls: Vec<AggregatedCall> = ids
                .iter()
                .map(|&token_id| {
                    AggregatedCall::lenient(
                        self.registry,
                        &IDelegationRegistry::getDelegationInfoCall { tokenId: token_id },
                    )
                })
                .collect();
            let results = self.multicall.aggregate(reader, &calls).await?;

            for (&token_id, result) in ids.iter().zip(results) {
                match result.decode::<IDelegationRegistry::getDelegationInfoCall>() {
                    Lookup::Found(ret) => match DelegationInfo::from(ret).class(now) {
                        DelegationClass::Active => classification.active.push(token_id),
                        DelegationClass::Expired => classification.expired.push(token_id),
                        DelegationClass::None => classification.none += 1,
                    },
                    Lookup::Failed => {
                        debug!(%token_id, "delegation lookup failed");
                        classification.failed += 1;
                    }
                    Lookup::Malformed(e) => {
                        debug!(%token_id, error = %e, "delegation lookup undecodable");
                        classification.malformed += 1;
                    }
                }
            }
            info!(checked, total, "checked delegation status");
        }

        if classification.failed + classification.malformed > 0 {
            warn!(
                failed = classification.failed,
                malformed = classification.malformed,
                "some delegation lookups were unreadable and are excluded"
            );
        }
        info!(
            delegated = classification.active.len() + classification.expired.len(),
            active = classification.active.len(),
            expired = classification.expired.len(),
            "classification done"
        );
        Ok(classification)
    }
}
