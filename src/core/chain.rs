//! Chain store
//!
//! Append-only sequence of accepted blocks. The last block is the head; every
//! block links to its predecessor by hash.

use crate::core::block::{Block, GENESIS_PREVIOUS_HASH};
use crate::core::transaction::Transaction;
use crate::core::validation::ValidationError;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Chain-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Block links to {actual}, but the head is {expected}")]
    ChainLinkMismatch { expected: String, actual: String },
    #[error("Duplicate block: {0}")]
    DuplicateBlock(String),
    #[error("Block timestamp {block} is earlier than head timestamp {head}")]
    TimestampRegression { head: i64, block: i64 },
    #[error("Transaction {0} is already in the chain")]
    DuplicateTransaction(String),
    #[error("Chain has no genesis block")]
    EmptyChain,
    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] ValidationError),
}

/// The block sequence plus lookup indexes
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    /// Block hash -> height
    by_hash: HashMap<String, u64>,
    /// Transaction id -> height of the containing block
    tx_index: HashMap<String, u64>,
}

impl Chain {
    /// Create a chain holding only the genesis block
    pub fn new() -> Self {
        let mut chain = Self::empty();
        chain.push(Block::genesis());
        chain
    }

    /// Create a chain with no blocks at all. The first appended block must
    /// carry the genesis previous hash.
    pub fn empty() -> Self {
        Self {
            blocks: Vec::new(),
            by_hash: HashMap::new(),
            tx_index: HashMap::new(),
        }
    }

    /// Get the latest block
    pub fn head(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Hash of the head, or the genesis previous hash on an empty chain
    pub fn head_hash(&self) -> &str {
        self.blocks
            .last()
            .map(|b| b.hash.as_str())
            .unwrap_or(GENESIS_PREVIOUS_HASH)
    }

    /// Append a block.
    ///
    /// Only linkage is checked here; hash and signature checks belong to the
    /// validator and run before a block reaches the store.
    pub fn append(&mut self, block: Block) -> Result<(), ChainError> {
        if self.by_hash.contains_key(&block.hash) {
            return Err(ChainError::DuplicateBlock(block.hash));
        }

        let expected = self.head_hash();
        if block.previous_hash != expected {
            return Err(ChainError::ChainLinkMismatch {
                expected: expected.to_string(),
                actual: block.previous_hash,
            });
        }

        if let Some(head) = self.blocks.last() {
            if block.timestamp < head.timestamp {
                return Err(ChainError::TimestampRegression {
                    head: head.timestamp,
                    block: block.timestamp,
                });
            }
        }

        let mut ids = HashSet::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            if self.tx_index.contains_key(&tx.id) || !ids.insert(tx.id.as_str()) {
                return Err(ChainError::DuplicateTransaction(tx.id.clone()));
            }
        }

        self.push(block);
        Ok(())
    }

    fn push(&mut self, block: Block) {
        let height = self.blocks.len() as u64;
        for tx in &block.transactions {
            self.tx_index.insert(tx.id.clone(), height);
        }
        self.by_hash.insert(block.hash.clone(), height);
        self.blocks.push(block);
    }

    /// Snapshot of every block
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// Height of the head (genesis is 0)
    pub fn height(&self) -> Result<u64, ChainError> {
        match self.blocks.len() {
            0 => Err(ChainError::EmptyChain),
            n => Ok(n as u64 - 1),
        }
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get a block by height
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// Get a block by hash
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.by_hash
            .get(hash)
            .and_then(|&height| self.get_block(height))
    }

    /// Whether a transaction id is already confirmed
    pub fn contains_transaction(&self, id: &str) -> bool {
        self.tx_index.contains_key(id)
    }

    /// Find a confirmed transaction and the height of its block
    pub fn find_transaction(&self, id: &str) -> Option<(u64, &Transaction)> {
        let height = *self.tx_index.get(id)?;
        self.get_block(height)?
            .transactions
            .iter()
            .find(|tx| tx.id == id)
            .map(|tx| (height, tx))
    }

    /// Walk the chain checking hashes and links
    pub fn is_valid(&self) -> bool {
        let Some(first) = self.blocks.first() else {
            return true;
        };
        if !first.is_genesis() || !first.verify_hash() {
            return false;
        }

        self.blocks.windows(2).all(|pair| {
            let (previous, current) = (&pair[0], &pair[1]);
            current.previous_hash == previous.hash
                && current.timestamp >= previous.timestamp
                && current.verify_hash()
        })
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height().unwrap_or(0),
            total_blocks: self.blocks.len() as u64,
            total_transactions: self.tx_index.len() as u64,
            latest_hash: self.head_hash().to_string(),
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

/// Chain statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub latest_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn next_block(chain: &Chain, ids: &[&str]) -> Block {
        let alice = KeyPair::generate();
        let txs = ids
            .iter()
            .map(|id| Transaction::signed(*id, "bob", 1, &alice).unwrap())
            .collect();
        let head = chain.head().unwrap();
        Block::new(head.hash.clone(), txs, head.timestamp + 1)
    }

    #[test]
    fn test_new_chain() {
        let chain = Chain::new();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.height().unwrap(), 0);
        assert!(chain.head().unwrap().is_genesis());
        assert!(chain.is_valid());
    }

    #[test]
    fn test_append_moves_head() {
        let mut chain = Chain::new();
        let block = next_block(&chain, &["t1"]);
        let hash = block.hash.clone();

        chain.append(block).unwrap();

        assert_eq!(chain.head().unwrap().hash, hash);
        assert_eq!(chain.height().unwrap(), 1);
        assert!(chain.contains_transaction("t1"));
        assert_eq!(chain.find_transaction("t1").unwrap().0, 1);
        assert!(chain.get_block_by_hash(&hash).is_some());
        assert!(chain.is_valid());
    }

    #[test]
    fn test_link_mismatch_leaves_chain_unchanged() {
        let mut chain = Chain::new();
        let alice = KeyPair::generate();
        let tx = Transaction::signed("t1", "bob", 1, &alice).unwrap();
        let block = Block::new("f".repeat(64), vec![tx], 5);

        let err = chain.append(block).unwrap_err();
        assert!(matches!(err, ChainError::ChainLinkMismatch { .. }));
        assert_eq!(chain.len(), 1);
        assert!(!chain.contains_transaction("t1"));
    }

    #[test]
    fn test_duplicate_block() {
        let mut chain = Chain::new();
        let block = next_block(&chain, &["t1"]);
        chain.append(block.clone()).unwrap();

        assert_eq!(
            chain.append(block.clone()).unwrap_err(),
            ChainError::DuplicateBlock(block.hash)
        );
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_duplicate_transaction_across_blocks() {
        let mut chain = Chain::new();
        let first = next_block(&chain, &["t1"]);
        chain.append(first).unwrap();

        let second = next_block(&chain, &["t1"]);
        assert_eq!(
            chain.append(second).unwrap_err(),
            ChainError::DuplicateTransaction("t1".to_string())
        );
    }

    #[test]
    fn test_timestamp_regression() {
        let mut chain = Chain::new();
        let first = next_block(&chain, &[]);
        let later = first.timestamp;
        chain.append(first).unwrap();

        let head_hash = chain.head().unwrap().hash.clone();
        let stale = Block::new(head_hash, vec![], later - 1);
        assert!(matches!(
            chain.append(stale),
            Err(ChainError::TimestampRegression { .. })
        ));
    }

    #[test]
    fn test_empty_chain() {
        let mut chain = Chain::empty();
        assert_eq!(chain.head().unwrap_err(), ChainError::EmptyChain);
        assert_eq!(chain.height().unwrap_err(), ChainError::EmptyChain);
        assert!(chain.is_valid());

        chain.append(Block::genesis()).unwrap();
        assert!(chain.head().unwrap().is_genesis());
    }

    #[test]
    fn test_chain_integrity() {
        let mut chain = Chain::new();
        for i in 0..5 {
            let id = format!("t{}", i);
            let block = next_block(&chain, &[id.as_str()]);
            chain.append(block).unwrap();
        }

        let blocks = chain.blocks();
        for i in 1..blocks.len() {
            assert_eq!(blocks[i].previous_hash, blocks[i - 1].hash);
        }
        assert!(chain.is_valid());

        let stats = chain.stats();
        assert_eq!(stats.height, 5);
        assert_eq!(stats.total_transactions, 5);
    }

    #[test]
    fn test_tampered_chain_is_invalid() {
        let mut chain = Chain::new();
        let block = next_block(&chain, &["t1"]);
        chain.append(block).unwrap();

        let mut blocks = chain.blocks();
        blocks[1].transactions[0].amount = 1_000;
        let mut tampered = Chain::empty();
        for block in blocks {
            tampered.push(block);
        }
        assert!(!tampered.is_valid());
    }
}
