//! Collaborator interfaces the pipeline drives but does not implement.
//!
//! Transport, signing and receipt polling live behind these traits so the
//! pipeline can run against a JSON-RPC node or an in-process mock alike.

use crate::error::{Error, Result};
use crate::fees::{FeeBid, FeeInputs};
use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::SolCall;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only access to contract state at the latest block.
pub trait ChainReader: Send + Sync {
    /// Execute `input` against `to` without creating a transaction.
    fn call(&self, to: Address, input: Bytes) -> BoxFuture<'_, Result<Bytes>>;
}

/// Outcome of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
}

/// Signs, broadcasts and observes mutating transactions.
///
/// `send` reports rejections as [`Error::Dispatch`]; `await_receipt` reports
/// timeouts and unobservable outcomes as [`Error::Confirmation`]. How long to
/// wait is the implementor's policy.
pub trait ChainWriter: Send + Sync {
    fn send(&self, to: Address, input: Bytes, fees: FeeBid) -> BoxFuture<'_, Result<B256>>;

    fn await_receipt(&self, tx_hash: B256) -> BoxFuture<'_, Result<TxReceipt>>;
}

/// Source of the fee-market readings used to price a transaction.
pub trait FeeOracle: Send + Sync {
    fn fee_inputs(&self) -> BoxFuture<'_, Result<FeeInputs>>;
}

/// Perform a plain typed read and decode its return value.
pub async fn read_call<C, R>(reader: &R, to: Address, call: C) -> Result<C::Return>
where
    C: SolCall,
    R: ChainReader + ?Sized,
{
    let output = reader.call(to, call.abi_encode().into()).await?;
    C::abi_decode_returns(&output).map_err(|e| Error::decode(C::SIGNATURE, e))
}
