/// Kernel consensus rules
///
/// Protocol epoch gating, entropy bits, stake modifier generation and
/// checkpointing, coin age, compact targets and the kernel hash itself.
pub mod checkpoint;
pub mod coin_age;
pub mod entropy;
pub mod kernel;
pub mod modifier;
pub mod protocol;
pub mod target;

// Re-export key types
pub use checkpoint::{
    check_stake_modifier_checkpoints, stake_modifier_checksum, CheckpointVerifier,
};
pub use coin_age::{coin_age, coin_age_weight, coin_day_weight};
pub use entropy::{modifier_interval_start, stake_entropy_bit, stake_entropy_bit_from_hash};
pub use kernel::{
    check_coin_stake_timestamp, check_kernel_timestamps, check_stake_kernel_hash,
    evaluate_kernel, kernel_hash, kernel_weight, KernelCandidate, KernelProof,
    STAKE_TIMESTAMP_MASK,
};
pub use modifier::{
    compute_next_stake_modifier, kernel_stake_modifier, next_stake_modifier_record,
    selection_interval, selection_interval_section, MODIFIER_INTERVAL_RATIO,
};
pub use protocol::{
    is_btc16_bips_enabled, is_protocol_v03, is_protocol_v04, is_protocol_v05, is_protocol_v06,
    is_protocol_v07, is_protocol_v09, is_super_majority, ProtocolEpoch, ProtocolRules,
};
pub use target::{decode_compact, target_from_compact, target_to_compact, weighted_target};
