//! Hash utilities for the kernel engine
//!
//! All consensus hashes are double-SHA256 over a little-endian byte stream.
//! A `Hash256` is kept in serialization order; when it has to be compared
//! as a number it is read as a little-endian unsigned 256-bit integer.

use primitive_types::U256;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// 256-bit hash value in serialization (little-endian) order
pub type Hash256 = [u8; 32];

/// 160-bit hash value (RIPEMD160 over SHA256)
pub type Hash160 = [u8; 20];

/// The all-zero hash, used for "no previous block" and PoW proof slots
pub const ZERO_HASH: Hash256 = [0u8; 32];

/// Double-SHA256 hash (Bitcoin compatible)
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Read a hash as an unsigned 256-bit integer
pub fn hash_to_u256(hash: &Hash256) -> U256 {
    U256::from_little_endian(hash)
}

/// Render a hash the way block explorers do (most significant byte first)
pub fn hash_to_hex(hash: &Hash256) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Append-only writer for consensus preimages.
///
/// Field widths are fixed by the caller; nothing is length-prefixed.
#[derive(Debug, Default, Clone)]
pub struct HashWriter {
    buf: Vec<u8>,
}

impl HashWriter {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(80) }
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_hash(&mut self, hash: &Hash256) -> &mut Self {
        self.buf.extend_from_slice(hash);
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Double-SHA256 of everything written so far
    pub fn finish(&self) -> Hash256 {
        sha256d(&self.buf)
    }
}
