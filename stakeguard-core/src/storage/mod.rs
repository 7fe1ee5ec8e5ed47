/// Chain-state collaborator for the kernel engine
///
/// Provides the block-index arena whose stake fields this engine populates,
/// the `ChainView` trait it reads history through, and an in-memory
/// implementation used for embedding and tests.
pub mod block_index;
pub mod chain_state;

// Re-export key types
pub use block_index::{
    flags_for, BlockId, BlockIndex, BlockIndexEntry, StakeModifierRecord, StakeState,
    BLOCK_PROOF_OF_STAKE, BLOCK_STAKE_ENTROPY, BLOCK_STAKE_MODIFIER,
};
pub use chain_state::{
    AncestorWalk, ChainStateError, ChainStateResult, ChainView, MemoryChainState, PrevOutput,
};
