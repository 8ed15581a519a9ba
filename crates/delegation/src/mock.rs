//! In-process chain used by the unit tests.
//!
//! Decodes real `aggregate3` calldata and answers ERC-721 and registry calls
//! from in-memory tables, so tests drive the same ABI path as a live node.

use crate::config::Contracts;
use crate::contracts::{IDelegationRegistry, IERC721Enumerable};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use bulk_revoke_core::multicall::Multicall3;
use bulk_revoke_core::{
    BoxFuture, ChainReader, ChainWriter, Error, FeeBid, FeeInputs, FeeOracle, Result, TokenId,
    TxReceipt,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Scripted outcome of one `send`.
#[derive(Clone, Debug)]
pub enum SendOutcome {
    Mined,
    Rejected(String),
    Reverted,
    NoReceipt,
}

#[derive(Default)]
pub struct MockChain {
    pub contracts: Contracts,
    /// Tokens held by the owner, by enumeration index.
    pub owned: Vec<TokenId>,
    pub balance_unavailable: bool,
    /// Balance to report instead of the number of owned tokens.
    pub reported_balance: Option<U256>,
    pub vanishing_indices: HashSet<usize>,
    /// Token id -> (delegatee, expiry timestamp).
    pub delegations: HashMap<TokenId, (Address, u64)>,
    pub reverting_lookups: HashSet<TokenId>,
    pub garbled_lookups: HashSet<TokenId>,
    pub send_script: Mutex<VecDeque<SendOutcome>>,

    /// Size of every aggregated page served.
    pub pages: Mutex<Vec<usize>>,
    pub plain_reads: Mutex<usize>,
    /// Token lists carried by every dispatched transaction.
    pub dispatched: Mutex<Vec<Vec<TokenId>>>,
    pub bids: Mutex<Vec<FeeBid>>,
    /// Ordered log of fee reads, sends and receipts.
    pub events: Mutex<Vec<String>>,
    pub outcomes: Mutex<HashMap<B256, SendOutcome>>,
}

pub fn token(n: u64) -> TokenId {
    U256::from(10_000 + n)
}

pub fn delegatee(n: u8) -> Address {
    Address::repeat_byte(n)
}

impl MockChain {
    pub fn holding(count: u64) -> Self {
        Self {
            owned: (0..count).map(token).collect(),
            ..Default::default()
        }
    }

    pub fn delegate(&mut self, token_id: TokenId, to: Address, expiry_ts: u64) {
        self.delegations.insert(token_id, (to, expiry_ts));
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = SendOutcome>) {
        self.send_script.lock().unwrap().extend(outcomes);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn serve(&self, call: &Multicall3::Call3) -> Multicall3::Result {
        let reverted = Multicall3::Result {
            success: false,
            returnData: Bytes::new(),
        };
        let found = |data: Vec<u8>| Multicall3::Result {
            success: true,
            returnData: data.into(),
        };

        if call.target == self.contracts.collection {
            let Ok(req) = IERC721Enumerable::tokenOfOwnerByIndexCall::abi_decode(&call.callData)
            else {
                return reverted;
            };
            let index = usize::try_from(req.index).unwrap();
            if self.vanishing_indices.contains(&index) {
                return reverted;
            }
            return match self.owned.get(index) {
                Some(id) => found(IERC721Enumerable::tokenOfOwnerByIndexCall::abi_encode_returns(id)),
                None => reverted,
            };
        }

        if call.target == self.contracts.registry {
            let Ok(req) = IDelegationRegistry::getDelegationInfoCall::abi_decode(&call.callData)
            else {
                return reverted;
            };
            if self.reverting_lookups.contains(&req.tokenId) {
                return reverted;
            }
            if self.garbled_lookups.contains(&req.tokenId) {
                return found(vec![0x01; 7]);
            }
            let (delegatee, expiry_ts) = self
                .delegations
                .get(&req.tokenId)
                .copied()
                .unwrap_or((Address::ZERO, 0));
            let ret = IDelegationRegistry::getDelegationInfoReturn {
                delegatee,
                info: IDelegationRegistry::DelegationInfo {
                    delegatedAt: 1,
                    expiryTs: expiry_ts,
                    permissionBitMap: 0,
                },
            };
            return found(IDelegationRegistry::getDelegationInfoCall::abi_encode_returns(&ret));
        }

        reverted
    }
}

impl ChainReader for MockChain {
    fn call(&self, to: Address, input: Bytes) -> BoxFuture<'_, Result<Bytes>> {
        Box::pin(async move {
            if to == self.contracts.collection {
                *self.plain_reads.lock().unwrap() += 1;
                if self.balance_unavailable {
                    return Err(Error::Rpc("execution reverted".into()));
                }
                IERC721Enumerable::balanceOfCall::abi_decode(&input)
                    .map_err(|e| Error::Rpc(e.to_string()))?;
                let balance = self
                    .reported_balance
                    .unwrap_or_else(|| U256::from(self.owned.len()));
                return Ok(IERC721Enumerable::balanceOfCall::abi_encode_returns(&balance).into());
            }

            if to != self.contracts.multicall {
                return Err(Error::Rpc(format!("no contract at {to}")));
            }
            let request = Multicall3::aggregate3Call::abi_decode(&input)
                .map_err(|e| Error::Rpc(e.to_string()))?;
            self.pages.lock().unwrap().push(request.calls.len());

            let mut results = Vec::with_capacity(request.calls.len());
            for call in &request.calls {
                let result = self.serve(call);
                if !result.success && !call.allowFailure {
                    return Err(Error::Rpc("execution reverted: Multicall3: call failed".into()));
                }
                results.push(result);
            }
            Ok(Multicall3::aggregate3Call::abi_encode_returns(&results).into())
        })
    }
}

impl FeeOracle for MockChain {
    fn fee_inputs(&self) -> BoxFuture<'_, Result<FeeInputs>> {
        Box::pin(async move {
            self.log("fees".into());
            Ok(FeeInputs {
                base_fee: Some(100),
                suggested_priority_fee: 10,
                legacy_gas_price: 50,
            })
        })
    }
}

impl ChainWriter for MockChain {
    fn send(&self, to: Address, input: Bytes, fees: FeeBid) -> BoxFuture<'_, Result<B256>> {
        Box::pin(async move {
            assert_eq!(to, self.contracts.registry);
            let call = IDelegationRegistry::bulkRevokeDelegationsCall::abi_decode(&input)
                .map_err(|e| Error::Dispatch(e.to_string()))?;
            let outcome = self
                .send_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(SendOutcome::Mined);

            let mut dispatched = self.dispatched.lock().unwrap();
            dispatched.push(call.tokenIds);
            self.bids.lock().unwrap().push(fees);
            let n = dispatched.len();
            drop(dispatched);

            self.log(format!("send:{n}"));
            if let SendOutcome::Rejected(reason) = outcome {
                return Err(Error::Dispatch(reason));
            }
            let tx_hash = B256::with_last_byte(n as u8);
            self.outcomes.lock().unwrap().insert(tx_hash, outcome);
            Ok(tx_hash)
        })
    }

    fn await_receipt(&self, tx_hash: B256) -> BoxFuture<'_, Result<TxReceipt>> {
        Box::pin(async move {
            self.log(format!("receipt:{}", tx_hash[31]));
            let outcome = self.outcomes.lock().unwrap().get(&tx_hash).cloned();
            match outcome {
                Some(SendOutcome::Mined) => Ok(TxReceipt {
                    tx_hash,
                    block_number: 500 + u64::from(tx_hash[31]),
                    success: true,
                }),
                Some(SendOutcome::Reverted) => Ok(TxReceipt {
                    tx_hash,
                    block_number: 500 + u64::from(tx_hash[31]),
                    success: false,
                }),
                _ => Err(Error::Confirmation(format!("no receipt for {tx_hash}"))),
            }
        })
    }
}
