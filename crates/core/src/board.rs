//! Shared batch list with message-passed status transitions.
//!
//! A [`BatchBoard`] owns the planned batches behind a `watch` channel. Every
//! transition is applied atomically through the sender, so any number of
//! operators may trigger batches in any order while observers follow along
//! through [`BatchBoard::subscribe`]. A batch already Submitting cannot be
//! started again until it reaches a terminal status.

use crate::batch::{plan_batches, Batch, BatchStatus};
use crate::error::{Error, Result};
use crate::TokenId;
use alloy::primitives::B256;
use tokio::sync::watch;

/// Count of batches in each status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoardSummary {
    pub pending: usize,
    pub submitting: usize,
    pub confirmed: usize,
    pub failed: usize,
}

impl BoardSummary {
    pub fn total(&self) -> usize {
        self.pending + self.submitting + self.confirmed + self.failed
    }
}

pub struct BatchBoard {
    state: watch::Sender<Vec<Batch>>,
}

impl BatchBoard {
    /// Plan `token_ids` into batches of `batch_size`.
    pub fn new(token_ids: &[TokenId], batch_size: usize) -> Result<Self> {
        let batches = plan_batches(token_ids, batch_size)?;
        let (state, _) = watch::channel(batches);
        Ok(Self { state })
    }

    /// Observe every transition applied to the board.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Batch>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Batch> {
        self.state.borrow().clone()
    }

    pub fn batch(&self, batch_num: usize) -> Option<Batch> {
        self.state
            .borrow()
            .iter()
            .find(|b| b.batch_num == batch_num)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// The full token list, in batch order.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.state
            .borrow()
            .iter()
            .flat_map(|b| b.token_ids.iter().copied())
            .collect()
    }

    /// Numbers of the batches that may be submitted now, in order.
    pub fn submittable(&self) -> Vec<usize> {
        self.state
            .borrow()
            .iter()
            .filter(|b| b.is_submittable())
            .map(|b| b.batch_num)
            .collect()
    }

    pub fn summary(&self) -> BoardSummary {
        let mut summary = BoardSummary::default();
        for batch in self.state.borrow().iter() {
            match batch.status {
                BatchStatus::Pending => summary.pending += 1,
                BatchStatus::Submitting => summary.submitting += 1,
                BatchStatus::Confirmed => summary.confirmed += 1,
                BatchStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Start a submission and return the batch's token ids.
    pub fn begin(&self, batch_num: usize) -> Result<Vec<TokenId>> {
        self.transition(batch_num, |batch| {
            batch.begin_submit()?;
            Ok(batch.token_ids.clone())
        })
    }

    pub fn record_dispatch(&self, batch_num: usize, tx_hash: B256) -> Result<()> {
        self.transition(batch_num, |batch| batch.record_dispatch(tx_hash))
    }

    pub fn confirm(&self, batch_num: usize, block_number: u64) -> Result<()> {
        self.transition(batch_num, |batch| batch.confirm(block_number))
    }

    pub fn fail(&self, batch_num: usize, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.transition(batch_num, |batch| batch.fail(message))
    }

    /// Re-chunk the board's token list with a new batch size.
    ///
    /// Only allowed while every batch is still Pending.
    pub fn replan(&self, batch_size: usize) -> Result<()> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|batches| {
            if batches.iter().any(|b| b.status != BatchStatus::Pending) {
                outcome = Err(Error::PlanLocked);
                return false;
            }
            let token_ids: Vec<TokenId> = batches
                .iter()
                .flat_map(|b| b.token_ids.iter().copied())
                .collect();
            match plan_batches(&token_ids, batch_size) {
                Ok(planned) => {
                    *batches = planned;
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        outcome
    }

    fn transition<T>(
        &self,
        batch_num: usize,
        apply: impl FnOnce(&mut Batch) -> Result<T>,
    ) -> Result<T> {
        let mut outcome = Err(Error::UnknownBatch(batch_num));
        self.state.send_if_modified(|batches| {
            let Some(batch) = batches.iter_mut().find(|b| b.batch_num == batch_num) else {
                return false;
            };
            outcome = apply(batch);
            outcome.is_ok()
        });
        outcome
    }
}
