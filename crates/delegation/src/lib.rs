//! Delegation discovery and bulk revocation for an ERC-721 collection.
//!
//! Finds every token an owner holds, reads each token's delegation grant from
//! the registry, and revokes the delegated ones in fixed-size batches, one
//! transaction at a time. The delegated list is checkpointed to a flat file
//! between the scan and the revocation so the operator can review it.

pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod contracts;
pub mod enumerate;
pub mod error;
pub mod revoke;
pub mod rpc;
pub mod scan;

#[cfg(test)]
mod mock;

pub use classify::{Classification, DelegationClass, DelegationClassifier, DelegationInfo};
pub use config::{Contracts, Settings};
pub use enumerate::{OwnedTokens, OwnershipEnumerator};
pub use error::{Error, Result};
pub use revoke::{bulk_revoke_calldata, Revoker, RunReport};
pub use scan::{scan, unix_now, ScanReport};

#[cfg(feature = "eth-rpc")]
pub use rpc::RpcClient;
