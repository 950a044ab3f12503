//! Cryptographic utilities for the engine
//!
//! This module provides:
//! - SHA-256 hashing and the canonical preimage encoding
//! - ECDSA key management (secp256k1)
//! - The `Signer` / `Verifier` abstraction used by validation

pub mod hash;
pub mod keys;
pub mod signer;

pub use hash::{sha256, Digest, Preimage, DIGEST_LEN};
pub use keys::{
    public_key_from_bytes, public_key_from_hex, public_key_to_address, sign_digest,
    verify_digest, KeyError, KeyPair, SIGNATURE_LEN,
};
pub use signer::{Secp256k1Verifier, Signer, Verifier};
