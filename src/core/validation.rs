//! Transaction and block validation
//!
//! Validation is read-only: nothing here touches the pool or the chain.

use crate::core::{Block, Transaction};
use crate::crypto::{KeyError, Secp256k1Verifier, Verifier};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Hash mismatch: stored {stored}, computed {computed}")]
    HashMismatch { stored: String, computed: String },
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Sender {sender} is not derived from the attached public key")]
    SenderMismatch { sender: String },
    #[error("Invalid key: {0}")]
    InvalidKey(KeyError),
    #[error("Invalid transaction {id}: {source}")]
    InvalidTransaction {
        id: String,
        #[source]
        source: Box<ValidationError>,
    },
    #[error("Transaction id appears more than once in the block")]
    DuplicateInBlock,
    #[error("Validation cancelled")]
    Cancelled,
}

impl ValidationError {
    fn invalid_transaction(id: &str, source: ValidationError) -> Self {
        ValidationError::InvalidTransaction {
            id: id.to_string(),
            source: Box::new(source),
        }
    }
}

impl From<KeyError> for ValidationError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidSignature => ValidationError::InvalidSignature,
            other => ValidationError::InvalidKey(other),
        }
    }
}

/// Checks hashes and signatures
#[derive(Clone)]
pub struct Validator {
    verifier: Arc<dyn Verifier>,
}

impl Validator {
    /// Create a validator for the given signature scheme
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        Self { verifier }
    }

    /// Validator for secp256k1 signatures
    pub fn secp256k1() -> Self {
        Self::new(Arc::new(Secp256k1Verifier))
    }

    /// Verify a transaction's hash, sender, and signature
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<(), ValidationError> {
        let digest = tx.calculate_digest();
        let computed = hex::encode(digest);
        if tx.hash != computed {
            return Err(ValidationError::HashMismatch {
                stored: tx.hash.clone(),
                computed,
            });
        }

        let public_key = hex::decode(&tx.public_key)
            .map_err(|_| ValidationError::InvalidKey(KeyError::InvalidKey))?;
        if self.verifier.derive_address(&public_key)? != tx.sender {
            return Err(ValidationError::SenderMismatch {
                sender: tx.sender.clone(),
            });
        }

        let signature =
            hex::decode(&tx.signature).map_err(|_| ValidationError::InvalidSignature)?;
        if !self.verifier.verify(&public_key, &digest, &signature)? {
            return Err(ValidationError::InvalidSignature);
        }

        Ok(())
    }

    /// Verify a block's hash and every transaction it carries
    pub fn verify_block(&self, block: &Block) -> Result<(), ValidationError> {
        self.verify_block_inner(block, None)
    }

    /// Like [`Validator::verify_block`], but gives up with
    /// [`ValidationError::Cancelled`] once `token` is cancelled. The token is
    /// checked before each transaction.
    pub fn verify_block_cancellable(
        &self,
        block: &Block,
        token: &CancellationToken,
    ) -> Result<(), ValidationError> {
        self.verify_block_inner(block, Some(token))
    }

    fn verify_block_inner(
        &self,
        block: &Block,
        token: Option<&CancellationToken>,
    ) -> Result<(), ValidationError> {
        let computed = block.calculate_hash();
        if computed != block.hash {
            return Err(ValidationError::HashMismatch {
                stored: block.hash.clone(),
                computed,
            });
        }

        let mut seen = HashSet::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            if token.is_some_and(|t| t.is_cancelled()) {
                return Err(ValidationError::Cancelled);
            }
            if !seen.insert(tx.id.as_str()) {
                return Err(ValidationError::invalid_transaction(
                    &tx.id,
                    ValidationError::DuplicateInBlock,
                ));
            }
            self.verify_transaction(tx)
                .map_err(|e| ValidationError::invalid_transaction(&tx.id, e))?;
        }

        Ok(())
    }

    /// Boolean form of [`Validator::verify_transaction`]
    pub fn is_valid_transaction(&self, tx: &Transaction) -> bool {
        self.verify_transaction(tx).is_ok()
    }

    /// Boolean form of [`Validator::verify_block`]
    pub fn is_valid_block(&self, block: &Block) -> bool {
        self.verify_block(block).is_ok()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::secp256k1()
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}
