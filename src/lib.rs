//! Block-Engine: a single-process block production and validation engine
//!
//! This crate provides:
//! - SHA-256 hashing over a canonical field encoding
//! - ECDSA digital signatures (secp256k1) behind `Signer`/`Verifier` traits
//! - A transaction pool with in-flight tracking, commit, and rollback
//! - A hash-linked chain store
//! - A block assembler and validator
//! - A cancellable consensus loop that ties them together
//!
//! # Example
//!
//! ```rust
//! use block_engine::consensus::{ChainState, ConsensusEngine, EngineConfig};
//! use block_engine::core::Transaction;
//! use block_engine::crypto::KeyPair;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let config = EngineConfig::default();
//! let state = Arc::new(ChainState::new(&config));
//! let engine = ConsensusEngine::new(state.clone(), &config).unwrap();
//!
//! // Submit a signed transfer
//! let alice = KeyPair::generate();
//! let tx = Transaction::signed("t1", "bob", 10, &alice).unwrap();
//! state.submit_transaction(tx).await.unwrap();
//!
//! // Produce one block
//! engine.run_cycle(&CancellationToken::new()).await.unwrap();
//! assert_eq!(state.get_head().await.unwrap().transaction_ids(), vec!["t1"]);
//! # });
//! ```

pub mod cli;
pub mod consensus;
pub mod core;
pub mod crypto;
pub mod mining;

// Re-export commonly used types
pub use crate::consensus::{ChainState, ConsensusEngine, CycleOutcome, EngineConfig, EngineState};
pub use crate::core::{Block, Chain, Transaction, Validator};
pub use crate::crypto::KeyPair;
pub use crate::mining::{BlockAssembler, EmptyBlockPolicy, Mempool};
