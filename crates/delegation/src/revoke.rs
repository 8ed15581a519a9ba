//! Revocation submitter: one `bulkRevokeDelegations` transaction per batch.

use crate::contracts::IDelegationRegistry;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use bulk_revoke_core::{
    estimate_fees, BatchBoard, ChainWriter, Error, FeeOracle, Result, TokenId, TxReceipt,
};
use tracing::{debug, info, warn};

/// Calldata revoking every grant on `token_ids`, in the given order.
pub fn bulk_revoke_calldata(token_ids: &[TokenId]) -> Bytes {
    IDelegationRegistry::bulkRevokeDelegationsCall {
        tokenIds: token_ids.to_vec(),
    }
    .abi_encode()
    .into()
}

/// Batch numbers by terminal outcome of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub confirmed: Vec<usize>,
    pub failed: Vec<usize>,
}

pub struct Revoker<'a> {
    writer: &'a dyn ChainWriter,
    fees: &'a dyn FeeOracle,
    registry: Address,
}

impl<'a> Revoker<'a> {
    pub fn new(writer: &'a dyn ChainWriter, fees: &'a dyn FeeOracle, registry: Address) -> Self {
        Self {
            writer,
            fees,
            registry,
        }
    }

    /// Submit batch `batch_num` and wait for its outcome.
    ///
    /// Refused while the batch is already Submitting or Confirmed. Any failure
    /// after the submission starts leaves the batch Failed with the error
    /// message, ready for an operator retry with the same token list.
    pub async fn submit(&self, board: &BatchBoard, batch_num: usize) -> Result<TxReceipt> {
        let token_ids = board.begin(batch_num)?;
        info!(
            batch = batch_num,
            of = board.len(),
            tokens = token_ids.len(),
            "revoking delegations"
        );

        match self.dispatch(board, batch_num, &token_ids).await {
            Ok(receipt) => {
                board.confirm(batch_num, receipt.block_number)?;
                info!(
                    batch = batch_num,
                    tx = %receipt.tx_hash,
                    block = receipt.block_number,
                    "confirmed"
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(batch = batch_num, error = %e, "batch failed");
                board.fail(batch_num, e.to_string())?;
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        board: &BatchBoard,
        batch_num: usize,
        token_ids: &[TokenId],
    ) -> Result<TxReceipt> {
        let fees = estimate_fees(self.fees)
            .await
            .map_err(|e| Error::Dispatch(format!("fee estimation: {e}")))?;
        debug!(
            max_fee_per_gas = fees.max_fee_per_gas,
            max_priority_fee_per_gas = fees.max_priority_fee_per_gas,
            "fee bid"
        );

        let tx_hash = self
            .writer
            .send(self.registry, bulk_revoke_calldata(token_ids), fees)
            .await?;
        board.record_dispatch(batch_num, tx_hash)?;
        debug!(batch = batch_num, tx = %tx_hash, "dispatched");

        let receipt = self.writer.await_receipt(tx_hash).await?;
        if !receipt.success {
            return Err(Error::Reverted {
                tx: tx_hash,
                block: receipt.block_number,
            });
        }
        Ok(receipt)
    }

    /// Submit every Pending or Failed batch in batch order, one at a time.
    ///
    /// Each batch reaches Confirmed or Failed before the next one starts. A
    /// failure does not stop the run.
    pub async fn run_sequential(&self, board: &BatchBoard) -> RunReport {
        let mut report = RunReport::default();
        for batch_num in board.submittable() {
            match self.submit(board, batch_num).await {
                Ok(_) => report.confirmed.push(batch_num),
                Err(_) => report.failed.push(batch_num),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::mock::{token, MockChain, SendOutcome};
    use bulk_revoke_core::{BatchStatus, FeeBid};

    fn ids(n: u64) -> Vec<TokenId> {
        (0..n).map(token).collect()
    }

    fn registry() -> Address {
        Settings::default().contracts.registry
    }

    #[test]
    fn calldata_carries_ids_in_order() {
        let input = bulk_revoke_calldata(&[token(3), token(1), token(2)]);
        let call = IDelegationRegistry::bulkRevokeDelegationsCall::abi_decode(&input).unwrap();
        assert_eq!(call.tokenIds, vec![token(3), token(1), token(2)]);
    }

    #[tokio::test]
    async fn batches_run_strictly_one_after_another() {
        let chain = MockChain::default();
        let board = BatchBoard::new(&ids(150), 100).unwrap();
        let report = Revoker::new(&chain, &chain, registry())
            .run_sequential(&board)
            .await;

        assert_eq!(report.confirmed, vec![1, 2]);
        assert!(report.failed.is_empty());
        assert_eq!(
            chain.events(),
            vec!["fees", "send:1", "receipt:1", "fees", "send:2", "receipt:2"]
        );
        let dispatched = chain.dispatched.lock().unwrap().clone();
        assert_eq!(dispatched.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 50]);
        assert_eq!(dispatched.concat(), ids(150));
        assert!(board.snapshot().iter().all(|b| b.status == BatchStatus::Confirmed));
    }

    #[tokio::test]
    async fn every_batch_gets_a_fresh_fee_bid() {
        let chain = MockChain::default();
        let board = BatchBoard::new(&ids(3), 1).unwrap();
        Revoker::new(&chain, &chain, registry())
            .run_sequential(&board)
            .await;
        let expected = FeeBid {
            max_fee_per_gas: 220,
            max_priority_fee_per_gas: 20,
        };
        assert_eq!(*chain.bids.lock().unwrap(), vec![expected; 3]);
        assert_eq!(chain.events().iter().filter(|e| *e == "fees").count(), 3);
    }

    #[tokio::test]
    async fn rejection_fails_only_that_batch() {
        let chain = MockChain::default();
        chain.script([
            SendOutcome::Mined,
            SendOutcome::Rejected("user rejected the request".into()),
            SendOutcome::Mined,
        ]);
        let board = BatchBoard::new(&ids(30), 10).unwrap();
        let report = Revoker::new(&chain, &chain, registry())
            .run_sequential(&board)
            .await;

        assert_eq!(report.confirmed, vec![1, 3]);
        assert_eq!(report.failed, vec![2]);
        let failed = board.batch(2).unwrap();
        assert_eq!(failed.status, BatchStatus::Failed);
        assert_eq!(failed.tx_hash, None);
        assert!(failed.error.unwrap().contains("user rejected"));
    }

    #[tokio::test]
    async fn reverted_receipt_fails_the_batch() {
        let chain = MockChain::default();
        chain.script([SendOutcome::Reverted]);
        let board = BatchBoard::new(&ids(2), 2).unwrap();
        let err = Revoker::new(&chain, &chain, registry())
            .submit(&board, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Reverted { .. }));
        let batch = board.batch(1).unwrap();
        assert_eq!(batch.status, BatchStatus::Failed);
        assert!(batch.tx_hash.is_some());
    }

    #[tokio::test]
    async fn missing_receipt_fails_the_batch() {
        let chain = MockChain::default();
        chain.script([SendOutcome::NoReceipt]);
        let board = BatchBoard::new(&ids(2), 2).unwrap();
        let err = Revoker::new(&chain, &chain, registry())
            .submit(&board, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Confirmation(_)));
        assert_eq!(board.batch(1).unwrap().status, BatchStatus::Failed);
    }

    #[tokio::test]
    async fn retry_resubmits_the_identical_batch() {
        let chain = MockChain::default();
        chain.script([SendOutcome::Rejected("insufficient funds".into()), SendOutcome::Mined]);
        let board = BatchBoard::new(&ids(5), 5).unwrap();
        let revoker = Revoker::new(&chain, &chain, registry());
        let mut rx = board.subscribe();

        assert!(revoker.submit(&board, 1).await.is_err());
        assert_eq!(rx.borrow_and_update()[0].status, BatchStatus::Failed);
        let receipt = revoker.submit(&board, 1).await.unwrap();

        let batch = board.batch(1).unwrap();
        assert_eq!(batch.status, BatchStatus::Confirmed);
        assert_eq!(batch.attempts, 2);
        assert_eq!(batch.error, None);
        assert_eq!(batch.tx_hash, Some(receipt.tx_hash));
        assert_eq!(batch.block_number, Some(receipt.block_number));

        let dispatched = chain.dispatched.lock().unwrap().clone();
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0], dispatched[1]);
        assert_eq!(dispatched[0], ids(5));
    }

    #[tokio::test]
    async fn sequential_rerun_only_touches_failed_batches() {
        let chain = MockChain::default();
        chain.script([SendOutcome::Mined, SendOutcome::Reverted]);
        let board = BatchBoard::new(&ids(4), 2).unwrap();
        let revoker = Revoker::new(&chain, &chain, registry());

        let first = revoker.run_sequential(&board).await;
        assert_eq!(first.failed, vec![2]);
        let second = revoker.run_sequential(&board).await;
        assert_eq!(second.confirmed, vec![2]);
        assert!(second.failed.is_empty());
        assert_eq!(chain.dispatched.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn confirmed_batch_cannot_be_resubmitted() {
        let chain = MockChain::default();
        let board = BatchBoard::new(&ids(2), 2).unwrap();
        let revoker = Revoker::new(&chain, &chain, registry());
        revoker.submit(&board, 1).await.unwrap();

        let err = revoker.submit(&board, 1).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(chain.dispatched.lock().unwrap().len(), 1);
        assert_eq!(board.batch(1).unwrap().status, BatchStatus::Confirmed);
    }
}
