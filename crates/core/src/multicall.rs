//! Aggregated reads through a Multicall3 deployment.
//!
//! [`Multicall::aggregate`] submits one `aggregate3` call per page and hands
//! back one [`AggregatedResult`] per [`AggregatedCall`], in call order. Decoding
//! the inner payloads stays with the caller via [`AggregatedResult::decode`].

use crate::chain::ChainReader;
use crate::error::{Error, Result};
use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::SolCall;
use std::ops::Range;

sol! {
    contract Multicall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// One inner call of an aggregated read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedCall {
    pub target: Address,
    pub allow_failure: bool,
    pub payload: Bytes,
}

impl AggregatedCall {
    /// A call whose failure is reported per-entry instead of failing the page.
    pub fn lenient<C: SolCall>(target: Address, call: &C) -> Self {
        Self {
            target,
            allow_failure: true,
            payload: call.abi_encode().into(),
        }
    }

    /// A call whose failure fails the whole aggregated read.
    pub fn strict<C: SolCall>(target: Address, call: &C) -> Self {
        Self {
            allow_failure: false,
            ..Self::lenient(target, call)
        }
    }
}

impl From<&AggregatedCall> for Multicall3::Call3 {
    fn from(call: &AggregatedCall) -> Self {
        Multicall3::Call3 {
            target: call.target,
            allowFailure: call.allow_failure,
            callData: call.payload.clone(),
        }
    }
}

/// Per-call outcome, index-aligned with the submitted calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatedResult {
    pub success: bool,
    pub return_data: Bytes,
}

/// What a single aggregated entry turned out to hold.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    /// The inner call reverted.
    Failed,
    /// The inner call succeeded but its bytes do not fit the expected shape.
    Malformed(Error),
}

impl AggregatedResult {
    /// Decode the entry as the return value of `C`.
    pub fn decode<C: SolCall>(&self) -> Lookup<C::Return> {
        if !self.success {
            return Lookup::Failed;
        }
        match C::abi_decode_returns(&self.return_data) {
            Ok(value) => Lookup::Found(value),
            Err(e) => Lookup::Malformed(Error::decode(C::SIGNATURE, e)),
        }
    }
}

/// Handle to a Multicall3 deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Multicall {
    address: Address,
}

impl Multicall {
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    /// Run `calls` as a single `aggregate3` read.
    ///
    /// The output has exactly one entry per call, in order. A failed entry for
    /// a call issued with `allow_failure = false` fails the whole read.
    pub async fn aggregate<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
        calls: &[AggregatedCall],
    ) -> Result<Vec<AggregatedResult>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let request = Multicall3::aggregate3Call {
            calls: calls.iter().map(Multicall3::Call3::from).collect(),
        };
        let output = reader.call(self.address, request.abi_encode().into()).await?;
        let results = Multicall3::aggregate3Call::abi_decode_returns(&output)
            .map_err(|e| Error::decode(Multicall3::aggregate3Call::SIGNATURE, e))?;

        if results.len() != calls.len() {
            return Err(Error::ResultCountMismatch {
                expected: calls.len(),
                got: results.len(),
            });
        }

        calls
            .iter()
            .zip(results)
            .enumerate()
            .map(|(index, (call, result))| {
                if !result.success && !call.allow_failure {
                    return Err(Error::StrictCallReverted { index });
                }
                Ok(AggregatedResult {
                    success: result.success,
                    return_data: result.returnData,
                })
            })
            .collect()
    }
}

/// Split `0..len` into consecutive pages of at most `page_size` entries.
pub fn page_ranges(len: usize, page_size: usize) -> Result<impl Iterator<Item = Range<usize>>> {
    if page_size == 0 {
        return Err(Error::ZeroPageSize);
    }
    Ok((0..len)
        .step_by(page_size)
        .map(move |start| start..len.min(start + page_size)))
}
