//! Error taxonomy for kernel validation
//!
//! Every variant is terminal for the candidate being validated; nothing here
//! is retried by the engine. Only [`KernelError::ChecksumMismatch`] says
//! anything about the rest of the chain.

use crate::hash::{hash_to_hex, Hash256};
use crate::storage::ChainStateError;
use crate::types::OutPoint;
use thiserror::Error;

/// Why a previous output could not back a stake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFailure {
    /// The outpoint does not resolve to a known output
    NotFound,
    /// The output exists but is not buried deep enough yet
    PrematureSpend { depth: u32, required: u32 },
}

/// Main error type for kernel and proof-of-stake validation
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("{}", describe_input_failure(.outpoint, .failure))]
    PrematureOrMissingInput {
        outpoint: OutPoint,
        failure: InputFailure,
    },

    #[error("Kernel hash {} above weighted target (weight {weight})", hash_to_hex(.hash))]
    KernelAboveTarget { hash: Hash256, weight: u64 },

    #[error("Invalid coinstake signature on input {input}")]
    InvalidSignature { input: usize },

    #[error("Stake modifier checkpoint mismatch at height {height}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        height: u32,
        expected: u32,
        actual: u32,
    },

    #[error("Proof-of-stake hash {} does not match recomputed {}", hash_to_hex(.supplied), hash_to_hex(.computed))]
    ProofHashMismatch { supplied: Hash256, computed: Hash256 },

    #[error("Stake modifier unavailable: {0}")]
    ModifierUnavailable(String),

    #[error("Transaction {} is not a coinstake", hash_to_hex(.0))]
    NotCoinStake(Hash256),

    #[error("Chain state error: {0}")]
    ChainState(#[from] ChainStateError),
}

impl KernelError {
    /// Checkpoint violations point at a software bug or a grinding fork and
    /// need operator attention; everything else only disqualifies the
    /// candidate.
    pub fn is_severe(&self) -> bool {
        matches!(self, KernelError::ChecksumMismatch { .. })
    }

    pub(crate) fn missing_input(outpoint: OutPoint) -> Self {
        KernelError::PrematureOrMissingInput {
            outpoint,
            failure: InputFailure::NotFound,
        }
    }
}

fn describe_input_failure(outpoint: &OutPoint, failure: &InputFailure) -> String {
    match failure {
        InputFailure::NotFound => format!("Previous output {outpoint} not found"),
        InputFailure::PrematureSpend { depth, required } => format!(
            "Premature spend of {outpoint}: {depth} confirmations, {required} required"
        ),
    }
}

/// Result type alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;
