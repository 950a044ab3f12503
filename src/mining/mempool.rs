//! Transaction pool (mempool) for pending transactions
//!
//! Holds validated, unconfirmed transactions in arrival order. Draining moves
//! transactions into an in-flight set so they cannot be drained twice; the
//! caller then either commits them (block accepted) or rolls them back (block
//! discarded), which puts them back at the front of the queue.

use crate::core::{Transaction, ValidationError, Validator};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Default maximum mempool transaction count
pub const DEFAULT_MEMPOOL_SIZE: usize = 10_000;

/// Mempool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("Transaction {0} already exists")]
    DuplicateTransaction(String),
    #[error("Transaction {0} is already confirmed")]
    AlreadyConfirmed(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] ValidationError),
    #[error("Mempool full ({0} transactions)")]
    MempoolFull(usize),
}

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The transaction
    pub tx: Transaction,
    /// When the transaction was added (Unix timestamp)
    pub added_time: i64,
    /// Arrival position, strictly increasing
    pub sequence: u64,
}

impl MempoolEntry {
    pub fn new(tx: Transaction, sequence: u64) -> Self {
        Self {
            tx,
            added_time: chrono::Utc::now().timestamp(),
            sequence,
        }
    }
}

/// Memory pool for pending transactions
#[derive(Debug)]
pub struct Mempool {
    /// Pending transactions indexed by ID
    entries: HashMap<String, MempoolEntry>,
    /// Pending transaction IDs in order of arrival
    by_time: VecDeque<String>,
    /// Drained but not yet committed or rolled back
    in_flight: HashMap<String, MempoolEntry>,
    /// Maximum number of pending transactions
    max_size: usize,
    next_sequence: u64,
}

impl Mempool {
    /// Create a new mempool
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMPOOL_SIZE)
    }

    /// Create a mempool holding at most `max_size` pending transactions
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_time: VecDeque::new(),
            in_flight: HashMap::new(),
            max_size,
            next_sequence: 0,
        }
    }

    /// Validate and add a transaction to the pool
    pub fn add_transaction(
        &mut self,
        tx: Transaction,
        validator: &Validator,
    ) -> Result<(), MempoolError> {
        if self.contains(&tx.id) {
            return Err(MempoolError::DuplicateTransaction(tx.id));
        }
        validator.verify_transaction(&tx)?;
        self.insert(tx)
    }

    /// Add a transaction that has already passed validation
    pub fn insert(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        if self.contains(&tx.id) {
            return Err(MempoolError::DuplicateTransaction(tx.id));
        }

        if self.entries.len() >= self.max_size {
            return Err(MempoolError::MempoolFull(self.max_size));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.by_time.push_back(tx.id.clone());
        self.entries.insert(tx.id.clone(), MempoolEntry::new(tx, sequence));
        Ok(())
    }

    /// Take up to `max` transactions in arrival order. They stay in flight
    /// until [`Mempool::commit`] or [`Mempool::rollback`].
    pub fn drain(&mut self, max: usize) -> Vec<Transaction> {
        let mut drained = Vec::with_capacity(max.min(self.by_time.len()));

        while drained.len() < max {
            let Some(id) = self.by_time.pop_front() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&id) {
                drained.push(entry.tx.clone());
                self.in_flight.insert(id, entry);
            }
        }

        drained
    }

    /// Forget in-flight transactions that are now in the chain
    pub fn commit(&mut self, tx_ids: &[String]) {
        for id in tx_ids {
            self.in_flight.remove(id);
        }
    }

    /// Return in-flight transactions to the front of the queue, keeping
    /// `tx_ids` order. Returns how many were restored.
    pub fn rollback(&mut self, tx_ids: &[String]) -> usize {
        let mut restored = 0;
        for id in tx_ids.iter().rev() {
            if let Some(entry) = self.in_flight.remove(id) {
                self.by_time.push_front(id.clone());
                self.entries.insert(id.clone(), entry);
                restored += 1;
            }
        }
        restored
    }

    /// Drop pending transactions whose id matches `confirmed`. Returns how
    /// many were dropped.
    pub fn purge(&mut self, confirmed: impl Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| !confirmed(id));
        let entries = &self.entries;
        self.by_time.retain(|id| entries.contains_key(id));
        before - self.entries.len()
    }

    /// Remove a pending transaction from the pool
    pub fn remove_transaction(&mut self, tx_id: &str) -> Option<Transaction> {
        if let Some(entry) = self.entries.remove(tx_id) {
            self.by_time.retain(|id| id != tx_id);
            Some(entry.tx)
        } else {
            self.in_flight.remove(tx_id).map(|e| e.tx)
        }
    }

    /// Remove transactions that are now in a block
    pub fn remove_transactions(&mut self, tx_ids: &[String]) {
        for id in tx_ids {
            self.remove_transaction(id);
        }
    }

    /// Check if a transaction is pending or in flight
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id) || self.in_flight.contains_key(id)
    }

    /// Get the number of pending transactions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of drained, uncommitted transactions
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Maximum number of pending transactions
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Pending transaction IDs in arrival order
    pub fn transaction_ids(&self) -> Vec<String> {
        self.by_time.iter().cloned().collect()
    }

    /// Get mempool statistics
    pub fn stats(&self) -> MempoolStats {
        MempoolStats {
            tx_count: self.entries.len(),
            in_flight: self.in_flight.len(),
            total_amount: self.entries.values().map(|e| e.tx.amount).sum(),
            oldest_added_time: self.entries.values().map(|e| e.added_time).min(),
            capacity: self.max_size,
        }
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

/// Mempool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolStats {
    pub tx_count: usize,
    pub in_flight: usize,
    pub total_amount: u64,
    pub oldest_added_time: Option<i64>,
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn signed(id: &str) -> Transaction {
        let alice = KeyPair::generate();
        Transaction::signed(id, "bob", 10, &alice).unwrap()
    }

    fn pool_with(ids: &[&str]) -> Mempool {
        let validator = Validator::default();
        let mut mempool = Mempool::new();
        for id in ids {
            mempool.add_transaction(signed(id), &validator).unwrap();
        }
        mempool
    }

    #[test]
    fn test_mempool_add_remove() {
        let mut mempool = pool_with(&["t1", "t2"]);
        assert_eq!(mempool.len(), 2);
        assert!(mempool.contains("t1"));

        let removed = mempool.remove_transaction("t1").unwrap();
        assert_eq!(removed.id, "t1");
        assert_eq!(mempool.transaction_ids(), vec!["t2".to_string()]);

        mempool.remove_transactions(&["t2".to_string(), "missing".to_string()]);
        assert!(mempool.is_empty());
    }

    #[test]
    fn test_mempool_duplicate() {
        let validator = Validator::default();
        let mut mempool = Mempool::new();
        let tx = signed("t1");

        mempool.add_transaction(tx.clone(), &validator).unwrap();
        assert_eq!(
            mempool.add_transaction(tx, &validator),
            Err(MempoolError::DuplicateTransaction("t1".to_string()))
        );
        assert_eq!(mempool.len(), 1);
    }

    #[test]
    fn test_mempool_rejects_invalid() {
        let validator = Validator::default();
        let mut mempool = Mempool::new();
        let mut tx = signed("t1");
        tx.amount = 11;

        assert!(matches!(
            mempool.add_transaction(tx, &validator),
            Err(MempoolError::InvalidTransaction(ValidationError::HashMismatch { .. }))
        ));
        assert!(mempool.is_empty());
    }

    #[test]
    fn test_mempool_max_size() {
        let validator = Validator::default();
        let mut mempool = Mempool::with_capacity(1);
        mempool.add_transaction(signed("t1"), &validator).unwrap();

        assert_eq!(
            mempool.add_transaction(signed("t2"), &validator),
            Err(MempoolError::MempoolFull(1))
        );
        assert_eq!(mempool.capacity(), 1);
    }

    #[test]
    fn test_drain_in_arrival_order() {
        let mut mempool = pool_with(&["t1", "t2", "t3"]);

        let drained = mempool.drain(2);
        let ids: Vec<_> = drained.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(mempool.len(), 1);
        assert_eq!(mempool.in_flight_len(), 2);

        assert!(mempool.drain(0).is_empty());
        assert_eq!(mempool.drain(10).len(), 1);
        assert!(mempool.drain(10).is_empty());
    }

    #[test]
    fn test_in_flight_counts_as_duplicate() {
        let validator = Validator::default();
        let mut mempool = Mempool::new();
        let tx = signed("t1");
        mempool.add_transaction(tx.clone(), &validator).unwrap();
        mempool.drain(1);

        assert_eq!(
            mempool.add_transaction(tx, &validator),
            Err(MempoolError::DuplicateTransaction("t1".to_string()))
        );
    }

    #[test]
    fn test_commit_forgets_in_flight() {
        let mut mempool = pool_with(&["t1", "t2"]);
        let ids: Vec<String> = mempool.drain(2).into_iter().map(|tx| tx.id).collect();

        mempool.commit(&ids);
        assert_eq!(mempool.in_flight_len(), 0);
        assert!(!mempool.contains("t1"));
        assert!(mempool.is_empty());
    }

    #[test]
    fn test_rollback_restores_front_of_queue() {
        let mut mempool = pool_with(&["t1", "t2", "t3"]);
        let ids: Vec<String> = mempool.drain(2).into_iter().map(|tx| tx.id).collect();

        assert_eq!(mempool.rollback(&ids), 2);
        assert_eq!(mempool.in_flight_len(), 0);
        assert_eq!(
            mempool.transaction_ids(),
            vec!["t1".to_string(), "t2".to_string(), "t3".to_string()]
        );
        // Rolling back twice is a no-op
        assert_eq!(mempool.rollback(&ids), 0);
    }

    #[test]
    fn test_insert_skips_validation() {
        let mut mempool = Mempool::with_capacity(1);
        let mut tx = signed("t1");
        tx.signature = String::new();

        mempool.insert(tx.clone()).unwrap();
        assert_eq!(
            mempool.insert(tx),
            Err(MempoolError::DuplicateTransaction("t1".to_string()))
        );
        assert_eq!(mempool.insert(signed("t2")), Err(MempoolError::MempoolFull(1)));
    }

    #[test]
    fn test_purge_confirmed() {
        let mut mempool = pool_with(&["t1", "t2", "t3"]);
        mempool.drain(1);

        // In-flight entries are left alone
        assert_eq!(mempool.purge(|id| id == "t1" || id == "t3"), 1);
        assert_eq!(mempool.transaction_ids(), vec!["t2".to_string()]);
        assert_eq!(mempool.in_flight_len(), 1);

        let drained = mempool.drain(5);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, "t2");
    }

    #[test]
    fn test_mempool_stats() {
        let mut mempool = pool_with(&["t1", "t2"]);
        mempool.drain(1);

        let stats = mempool.stats();
        assert_eq!(stats.tx_count, 1);
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.total_amount, 10);
        assert!(stats.oldest_added_time.is_some());

        mempool.rollback(&["t1".to_string()]);
        assert_eq!(mempool.stats().tx_count, 2);
        assert_eq!(mempool.stats().in_flight, 0);
    }
}
