//! Cryptographic hashing utilities for the engine
//!
//! Provides the SHA-256 digest used for transaction and block hashes, and the
//! canonical preimage encoding that is fed into it.

use sha2::{Digest as _, Sha256};

/// Length of a digest in bytes
pub const DIGEST_LEN: usize = 32;

/// Fixed-length output of [`sha256`]
pub type Digest = [u8; DIGEST_LEN];

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Canonical byte encoding of the fields that get hashed.
///
/// Variable-length fields carry a big-endian u64 length prefix and integers
/// are fixed-width big-endian, so distinct field tuples never share an
/// encoding.
#[derive(Debug, Default, Clone)]
pub struct Preimage {
    buf: Vec<u8>,
}

impl Preimage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a length-prefixed byte field
    pub fn bytes(mut self, field: &[u8]) -> Self {
        self.buf.extend_from_slice(&(field.len() as u64).to_be_bytes());
        self.buf.extend_from_slice(field);
        self
    }

    /// Append a length-prefixed string field
    pub fn str(self, field: &str) -> Self {
        self.bytes(field.as_bytes())
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i64(mut self, value: i64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// The encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Hash the encoded bytes
    pub fn digest(&self) -> Digest {
        sha256(&self.buf)
    }
}
