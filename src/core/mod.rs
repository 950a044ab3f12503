//! Core engine components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (signed transfers)
//! - Blocks (hash-linked transaction batches)
//! - Chain (append-only block store)
//! - Validation (hash and signature checks)

pub mod block;
pub mod chain;
pub mod transaction;
pub mod validation;

pub use block::{Block, GENESIS_PREVIOUS_HASH, GENESIS_TIMESTAMP};
pub use chain::{Chain, ChainError, ChainStats};
pub use transaction::Transaction;
pub use validation::{ValidationError, Validator};
