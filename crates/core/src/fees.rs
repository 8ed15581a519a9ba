//! EIP-1559 fee bids, computed fresh before every submission.

use crate::chain::FeeOracle;
use crate::error::Result;

/// Priority fee multiplier, in percent of the node's suggestion.
pub const PRIORITY_FEE_PERCENT: u128 = 200;

/// Base fee multiplier applied when deriving the fee cap.
pub const BASE_FEE_MULTIPLIER: u128 = 2;

/// Fee-market readings taken immediately before a submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeInputs {
    /// Base fee of the latest block; `None` on chains without EIP-1559 blocks.
    pub base_fee: Option<u128>,
    pub suggested_priority_fee: u128,
    pub legacy_gas_price: u128,
}

/// Fee parameters attached to a mutating transaction.
///
/// `max_fee_per_gas >= max_priority_fee_per_gas` is not enforced here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeBid {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl FeeBid {
    /// Derive a bid: doubled priority tip, twice the base fee on top, and the
    /// legacy gas price as a floor for the cap.
    pub fn from_inputs(inputs: FeeInputs) -> Self {
        let max_priority_fee_per_gas =
            inputs.suggested_priority_fee.saturating_mul(PRIORITY_FEE_PERCENT) / 100;
        let base_fee = inputs.base_fee.unwrap_or(0);
        let max_fee_per_gas = base_fee
            .saturating_mul(BASE_FEE_MULTIPLIER)
            .saturating_add(max_priority_fee_per_gas)
            .max(inputs.legacy_gas_price);
        FeeBid {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }
}

/// Read current fee inputs from `oracle` and derive a bid. Never cached.
pub async fn estimate_fees<O: FeeOracle + ?Sized>(oracle: &O) -> Result<FeeBid> {
    let inputs = oracle.fee_inputs().await?;
    Ok(FeeBid::from_inputs(inputs))
}
