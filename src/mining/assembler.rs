//! Block assembly
//!
//! Drains pending transactions into a candidate block linked to the current
//! head. Candidates are not validated or appended here.

use crate::core::{Block, Transaction};
use crate::mining::Mempool;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default maximum number of transactions per block
pub const DEFAULT_MAX_BLOCK_TXS: usize = 500;

/// What to do when the pool is empty at assembly time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBlockPolicy {
    /// Produce nothing this cycle
    #[default]
    Skip,
    /// Produce a block with no transactions
    Produce,
}

/// Assembly statistics
#[derive(Debug, Clone)]
pub struct AssemblyStats {
    /// Number of transactions drained into the block
    pub tx_count: usize,
    /// Time taken in microseconds
    pub time_us: u128,
}

/// Builds candidate blocks from the pool
#[derive(Debug, Clone)]
pub struct BlockAssembler {
    /// Maximum transactions per block
    pub max_transactions: usize,
    /// Empty pool behaviour
    pub empty_policy: EmptyBlockPolicy,
}

impl BlockAssembler {
    /// Create a new assembler
    pub fn new(max_transactions: usize, empty_policy: EmptyBlockPolicy) -> Self {
        Self {
            max_transactions,
            empty_policy,
        }
    }

    /// Drain up to `max_transactions` from `pool` into a block on top of
    /// `head`.
    ///
    /// Returns `None` when the pool is empty and the policy is
    /// [`EmptyBlockPolicy::Skip`]. Drained transactions are left in flight in
    /// the pool; the caller must commit or roll them back.
    pub fn assemble(&self, pool: &mut Mempool, head: &Block) -> Option<(Block, AssemblyStats)> {
        let start = Instant::now();

        let transactions = pool.drain(self.max_transactions);
        if transactions.is_empty() && self.empty_policy == EmptyBlockPolicy::Skip {
            debug!("Pool empty, skipping block on top of {}", head.hash);
            return None;
        }

        let block = self.build_block(head, transactions);
        let stats = AssemblyStats {
            tx_count: block.tx_count(),
            time_us: start.elapsed().as_micros(),
        };

        info!(
            "Assembled block {} with {} transactions in {}us",
            block.hash, stats.tx_count, stats.time_us
        );

        Some((block, stats))
    }

    /// Build a block on top of `head` from an explicit transaction list
    pub fn build_block(&self, head: &Block, transactions: Vec<Transaction>) -> Block {
        // Never go backwards, even if the wall clock does
        let timestamp = chrono::Utc::now().timestamp().max(head.timestamp);
        Block::new(head.hash.clone(), transactions, timestamp)
    }
}

impl Default for BlockAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BLOCK_TXS, EmptyBlockPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chain, Validator};
    use crate::crypto::KeyPair;

    fn pool_with(count: usize) -> Mempool {
        let validator = Validator::default();
        let alice = KeyPair::generate();
        let mut pool = Mempool::new();
        for i in 0..count {
            let tx = Transaction::signed(format!("t{}", i), "bob", 1, &alice).unwrap();
            pool.add_transaction(tx, &validator).unwrap();
        }
        pool
    }

    #[test]
    fn test_skip_on_empty_pool() {
        let assembler = BlockAssembler::default();
        let mut pool = Mempool::new();
        assert!(assembler.assemble(&mut pool, &Block::genesis()).is_none());
    }

    #[test]
    fn test_produce_empty_block() {
        let assembler = BlockAssembler::new(10, EmptyBlockPolicy::Produce);
        let mut pool = Mempool::new();
        let genesis = Block::genesis();

        let (block, stats) = assembler.assemble(&mut pool, &genesis).unwrap();
        assert_eq!(stats.tx_count, 0);
        assert_eq!(block.previous_hash, genesis.hash);
        assert!(block.verify_hash());
    }

    #[test]
    fn test_assembled_block_is_valid() {
        let assembler = BlockAssembler::default();
        let validator = Validator::default();
        let mut pool = pool_with(3);
        let mut chain = Chain::new();
        let head = chain.head().unwrap().clone();

        let (block, stats) = assembler.assemble(&mut pool, &head).unwrap();

        assert_eq!(stats.tx_count, 3);
        assert_eq!(block.previous_hash, head.hash);
        assert!(block.timestamp >= head.timestamp);
        assert!(validator.verify_block(&block).is_ok());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.in_flight_len(), 3);

        chain.append(block).unwrap();
        assert!(chain.is_valid());
    }

    #[test]
    fn test_respects_max_transactions() {
        let assembler = BlockAssembler::new(2, EmptyBlockPolicy::Skip);
        let mut pool = pool_with(5);

        let (block, _) = assembler.assemble(&mut pool, &Block::genesis()).unwrap();
        assert_eq!(block.transaction_ids(), vec!["t0", "t1"]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_timestamp_never_regresses() {
        let assembler = BlockAssembler::default();
        let future = Block::new(Block::genesis().hash, vec![], i64::MAX / 2);
        let block = assembler.build_block(&future, vec![]);
        assert_eq!(block.timestamp, future.timestamp);
    }
}
