//! Block implementation for the engine
//!
//! A block groups transactions and links to its predecessor through
//! `previous_hash`. Blocks are not signed; authenticity comes from the
//! signatures on the transactions they carry.

use crate::core::transaction::Transaction;
use crate::crypto::{Digest, Preimage};
use serde::{Deserialize, Serialize};

/// Previous hash of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Timestamp of the genesis block, fixed so every instance shares it
pub const GENESIS_TIMESTAMP: i64 = 0;

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block hash (hex)
    pub hash: String,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Transactions, in inclusion order
    pub transactions: Vec<Transaction>,
    /// Creation time in Unix seconds
    pub timestamp: i64,
}

impl Block {
    /// Create a block and compute its hash
    pub fn new(previous_hash: String, transactions: Vec<Transaction>, timestamp: i64) -> Self {
        let mut block = Self {
            hash: String::new(),
            previous_hash,
            transactions,
            timestamp,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Create the genesis block
    pub fn genesis() -> Self {
        Self::new(
            GENESIS_PREVIOUS_HASH.to_string(),
            Vec::new(),
            GENESIS_TIMESTAMP,
        )
    }

    /// Whether this block has no predecessor
    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREVIOUS_HASH
    }

    /// Digest over `previous_hash || serialize(transactions) || timestamp`
    pub fn calculate_digest(&self) -> Digest {
        let mut preimage = Preimage::new()
            .str(&self.previous_hash)
            .u64(self.transactions.len() as u64);
        for tx in &self.transactions {
            preimage = tx.write_to(preimage);
        }
        preimage.i64(self.timestamp).digest()
    }

    /// Hex form of [`Block::calculate_digest`]
    pub fn calculate_hash(&self) -> String {
        hex::encode(self.calculate_digest())
    }

    /// Verify the block hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Ids of the contained transactions
    pub fn transaction_ids(&self) -> Vec<String> {
        self.transactions.iter().map(|tx| tx.id.clone()).collect()
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
