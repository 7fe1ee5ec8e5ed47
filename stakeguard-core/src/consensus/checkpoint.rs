//! Stake modifier checkpoints
//!
//! Every connected block carries a 32-bit checksum chained from its
//! predecessor's checksum and its own stake fields, so a single divergence
//! anywhere in history changes every later checksum. A small hardcoded
//! table pins the expected checksum at selected heights, letting a node
//! notice a grinding fork without re-deriving the whole history.

use crate::config::ConsensusParams;
use crate::error::{KernelError, KernelResult};
use crate::hash::{hash_to_u256, Hash256, HashWriter};
use tracing::{debug, error};

/// Checksum of a block's stake fields chained onto its predecessor's.
///
/// `prev_checksum` is `None` only for genesis. `proof_hash` is the
/// proof-of-stake hash, zero for proof-of-work blocks.
pub fn stake_modifier_checksum(
    prev_checksum: Option<u32>,
    flags: u32,
    proof_hash: &Hash256,
    modifier: u64,
) -> u32 {
    let mut writer = HashWriter::new();
    if let Some(prev) = prev_checksum {
        writer.write_u32(prev);
    }
    writer
        .write_u32(flags)
        .write_hash(proof_hash)
        .write_u64(modifier);

    (hash_to_u256(&writer.finish()) >> 224).low_u32()
}

/// True unless `height` is checkpointed with a different checksum
pub fn check_stake_modifier_checkpoints(
    params: &ConsensusParams,
    height: u32,
    checksum: u32,
) -> bool {
    params
        .checkpoint_checksum(height)
        .map_or(true, |expected| expected == checksum)
}

/// Checkpoint table lookups that report violations
#[derive(Debug, Clone, Copy)]
pub struct CheckpointVerifier<'a> {
    params: &'a ConsensusParams,
}

impl<'a> CheckpointVerifier<'a> {
    pub fn new(params: &'a ConsensusParams) -> Self {
        Self { params }
    }

    /// Check a freshly computed checksum against the table
    pub fn verify(&self, height: u32, checksum: u32) -> KernelResult<()> {
        match self.params.checkpoint_checksum(height) {
            Some(expected) if expected != checksum => {
                error!(
                    "Stake modifier checkpoint mismatch at height {}: expected {:#010x}, got {:#010x}",
                    height, expected, checksum
                );
                Err(KernelError::ChecksumMismatch {
                    height,
                    expected,
                    actual: checksum,
                })
            }
            Some(_) => {
                debug!("Stake modifier checkpoint passed at height {}", height);
                Ok(())
            }
            None => Ok(()),
        }
    }
}
