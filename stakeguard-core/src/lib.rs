// Stakeguard Core
// Proof-of-stake kernel validation engine

// Public modules
pub mod config;
pub mod consensus;
pub mod error;
pub mod hash;
pub mod storage;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_common;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use crate::config::{ConfigError, ConsensusParams, NetworkType};
pub use crate::error::{InputFailure, KernelError, KernelResult};
pub use crate::hash::{Hash256, ZERO_HASH};
pub use crate::storage::{
    BlockId, BlockIndex, BlockIndexEntry, ChainStateError, ChainView, MemoryChainState,
    PrevOutput, StakeModifierRecord, StakeState,
};
pub use crate::types::{Amount, Block, BlockHeader, OutPoint, Transaction, TxIn, TxOut};

// Re-export the validation API
pub use crate::consensus::{
    check_coin_stake_timestamp, check_stake_kernel_hash, check_stake_modifier_checkpoints,
    coin_age, compute_next_stake_modifier, evaluate_kernel, kernel_stake_modifier,
    stake_entropy_bit, stake_modifier_checksum, KernelCandidate, KernelProof, ProtocolEpoch,
    ProtocolRules,
};
pub use crate::validation::{
    check_proof_of_stake, connect_block_stake, SignatureVerifier, StakeProof, StakeValidation,
    ValidationContext, ValidationStage,
};
