//! Transaction handling for the engine
//!
//! A transaction moves `amount` from `sender` to `recipient`. It carries the
//! sender's public key and a signature over its content hash, so any node can
//! check authorship without outside state.

use crate::crypto::{Digest, KeyError, Preimage, Signer};
use serde::{Deserialize, Serialize};

/// A signed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier
    pub id: String,
    /// Sender address (derived from `public_key`)
    pub sender: String,
    /// Recipient address
    pub recipient: String,
    /// Amount transferred
    pub amount: u64,
    /// Sender's public key (hex)
    pub public_key: String,
    /// Signature over `hash` (hex)
    pub signature: String,
    /// Content hash (hex)
    pub hash: String,
}

impl Transaction {
    /// Create and sign a transaction. The sender is the signer's address.
    pub fn signed(
        id: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
        signer: &dyn Signer,
    ) -> Result<Self, KeyError> {
        let mut tx = Self {
            id: id.into(),
            sender: signer.address(),
            recipient: recipient.into(),
            amount,
            public_key: hex::encode(signer.public_key_bytes()),
            signature: String::new(),
            hash: String::new(),
        };
        let digest = tx.calculate_digest();
        tx.hash = hex::encode(digest);
        tx.signature = hex::encode(signer.sign(&digest)?);
        Ok(tx)
    }

    /// Digest over `id || sender || recipient || amount`
    pub fn calculate_digest(&self) -> Digest {
        Self::content_digest(&self.id, &self.sender, &self.recipient, self.amount)
    }

    /// Hex form of [`Transaction::calculate_digest`]
    pub fn calculate_hash(&self) -> String {
        hex::encode(self.calculate_digest())
    }

    /// Digest for the given content fields
    pub fn content_digest(id: &str, sender: &str, recipient: &str, amount: u64) -> Digest {
        Preimage::new()
            .str(id)
            .str(sender)
            .str(recipient)
            .u64(amount)
            .digest()
    }

    /// Check the stored hash against the content
    pub fn verify_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Append the full serialized transaction to a block preimage
    pub(crate) fn write_to(&self, preimage: Preimage) -> Preimage {
        preimage
            .str(&self.id)
            .str(&self.sender)
            .str(&self.recipient)
            .u64(self.amount)
            .str(&self.public_key)
            .str(&self.signature)
            .str(&self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_signed_transaction() {
        let alice = KeyPair::generate();
        let tx = Transaction::signed("t1", "bob", 10, &alice).unwrap();

        assert_eq!(tx.sender, alice.address());
        assert_eq!(tx.public_key, alice.public_key_hex());
        assert!(tx.verify_hash());

        let signature = hex::decode(&tx.signature).unwrap();
        assert!(alice.verify(&tx.calculate_digest(), &signature).unwrap());
    }

    #[test]
    fn test_hash_covers_every_content_field() {
        let alice = KeyPair::generate();
        let tx = Transaction::signed("t1", "bob", 10, &alice).unwrap();

        let mut changed = tx.clone();
        changed.amount += 1;
        assert!(!changed.verify_hash());

        let mut changed = tx.clone();
        changed.recipient = "mallory".to_string();
        assert!(!changed.verify_hash());

        let mut changed = tx.clone();
        changed.id = "t2".to_string();
        assert!(!changed.verify_hash());
    }

    #[test]
    fn test_hash_is_idempotent() {
        let alice = KeyPair::generate();
        let tx = Transaction::signed("t1", "bob", 10, &alice).unwrap();
        assert_eq!(tx.calculate_hash(), tx.calculate_hash());
        assert_eq!(
            tx.calculate_digest(),
            Transaction::content_digest("t1", &alice.address(), "bob", 10)
        );
    }

    #[test]
    fn test_serde_round_trip_keeps_hash_valid() {
        let alice = KeyPair::generate();
        let tx = Transaction::signed("t1", "bob", 10, &alice).unwrap();
        let json = serde_json::to_string(&tx).unwrap();
        let decoded: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.verify_hash());
    }
}
