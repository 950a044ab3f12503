//! Signing abstraction
//!
//! Consensus code only sees these traits, so the signature scheme can be
//! replaced without touching block assembly or validation.

use super::hash::Digest;
use super::keys::{public_key_from_bytes, public_key_to_address, verify_digest, KeyError, KeyPair};

/// Something that can authorise transactions
pub trait Signer: Send + Sync {
    /// Encoded public key, as carried in transactions
    fn public_key_bytes(&self) -> Vec<u8>;

    /// Address derived from the public key
    fn address(&self) -> String;

    /// Sign a digest
    fn sign(&self, digest: &Digest) -> Result<Vec<u8>, KeyError>;
}

/// Signature verification for one scheme
pub trait Verifier: Send + Sync {
    /// Check `signature` over `digest` against an encoded public key.
    ///
    /// Malformed keys fail with [`KeyError::InvalidKey`], malformed signatures
    /// with [`KeyError::InvalidSignature`].
    fn verify(&self, public_key: &[u8], digest: &Digest, signature: &[u8])
        -> Result<bool, KeyError>;

    /// Derive the address that owns an encoded public key
    fn derive_address(&self, public_key: &[u8]) -> Result<String, KeyError>;
}

impl Signer for KeyPair {
    fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    fn address(&self) -> String {
        KeyPair::address(self)
    }

    fn sign(&self, digest: &Digest) -> Result<Vec<u8>, KeyError> {
        KeyPair::sign(self, digest)
    }
}

/// secp256k1 ECDSA verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl Verifier for Secp256k1Verifier {
    fn verify(
        &self,
        public_key: &[u8],
        digest: &Digest,
        signature: &[u8],
    ) -> Result<bool, KeyError> {
        let public_key = public_key_from_bytes(public_key)?;
        verify_digest(&public_key, digest, signature)
    }

    fn derive_address(&self, public_key: &[u8]) -> Result<String, KeyError> {
        let public_key = public_key_from_bytes(public_key)?;
        Ok(public_key_to_address(&public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256;

    #[test]
    fn test_signer_and_verifier_agree() {
        let kp = KeyPair::generate();
        let signer: &dyn Signer = &kp;
        let verifier = Secp256k1Verifier;
        let digest = sha256(b"payload");

        let signature = signer.sign(&digest).unwrap();
        assert!(verifier
            .verify(&signer.public_key_bytes(), &digest, &signature)
            .unwrap());
        assert_eq!(
            verifier.derive_address(&signer.public_key_bytes()).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn test_verifier_rejects_bad_key() {
        let verifier = Secp256k1Verifier;
        let digest = sha256(b"payload");
        assert_eq!(
            verifier.verify(&[1, 2, 3], &digest, &[0u8; 64]).unwrap_err(),
            KeyError::InvalidKey
        );
        assert_eq!(
            verifier.derive_address(&[]).unwrap_err(),
            KeyError::InvalidKey
        );
    }
}
