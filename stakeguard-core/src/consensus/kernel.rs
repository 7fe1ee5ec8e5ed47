//! Kernel hash evaluation
//!
//! A coinstake's first input is its kernel. The kernel hash commits to the
//! stake modifier, where the staked output was created and the candidate
//! timestamp, and must not exceed the block target scaled by the stake's
//! weight:
//!
//! ```text
//! sha256d(modifier | block_from.time | tx_prev_offset | tx_prev.time
//!         | prevout.txid | prevout.vout | candidate_time) <= target * weight
//! ```
//!
//! Before V03 the compact target takes the modifier's place in the
//! preimage. Before V09 the weight is coin-days; from V09 it is the staked
//! amount itself.

use crate::config::ConsensusParams;
use crate::consensus::coin_age::coin_day_weight;
use crate::consensus::modifier::kernel_stake_modifier;
use crate::consensus::protocol::{is_protocol_v03, is_protocol_v09};
use crate::consensus::target::weighted_target;
use crate::error::{KernelError, KernelResult};
use crate::hash::{hash_to_hex, hash_to_u256, Hash256, HashWriter};
use crate::storage::{BlockId, ChainView};
use crate::types::{Amount, BlockHeader, OutPoint, Transaction};
use primitive_types::U512;
use tracing::{debug, trace};

/// Low bits that must be clear in V09 coinstake and block timestamps
pub const STAKE_TIMESTAMP_MASK: u32 = 15;

/// Everything the kernel hash and weight are computed from
#[derive(Debug, Clone, Copy)]
pub struct KernelCandidate<'a> {
    /// Header of the block holding the staked output
    pub block_from: &'a BlockHeader,
    pub stake_modifier: u64,
    pub target_bits: u32,
    pub prev_tx_time: u32,
    pub prev_amount: Amount,
    pub prevout: OutPoint,
    pub candidate_time: u32,
    /// Offset of the staked transaction inside `block_from`
    pub tx_prev_offset: u32,
}

/// An accepted kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelProof {
    pub hash: Hash256,
    pub weight: u64,
    pub stake_modifier: u64,
}

/// Stake weight of `amount`, created at `prev_tx_time`, staked at
/// `candidate_time`
pub fn kernel_weight(
    params: &ConsensusParams,
    amount: Amount,
    prev_tx_time: u32,
    candidate_time: u32,
) -> u64 {
    if is_protocol_v09(params, candidate_time) {
        return amount.as_units();
    }

    let held = (i64::from(candidate_time) - i64::from(prev_tx_time))
        .min(i64::from(params.stake_max_age));
    let discount = if is_protocol_v03(params, candidate_time) {
        i64::from(params.stake_min_age)
    } else {
        0
    };
    let time_weight = (held - discount).max(0) as u64;
    coin_day_weight(amount, time_weight)
}

/// Double-SHA256 of the kernel preimage
pub fn kernel_hash(params: &ConsensusParams, candidate: &KernelCandidate<'_>) -> Hash256 {
    let mut writer = HashWriter::new();
    if is_protocol_v03(params, candidate.candidate_time) {
        writer.write_u64(candidate.stake_modifier);
    } else {
        writer.write_u32(candidate.target_bits);
    }
    writer
        .write_u32(candidate.block_from.time)
        .write_u32(candidate.tx_prev_offset)
        .write_u32(candidate.prev_tx_time)
        .write_hash(&candidate.prevout.txid)
        .write_u32(candidate.prevout.vout)
        .write_u32(candidate.candidate_time);
    writer.finish()
}

/// Ordering and minimum-age checks between the staked output and the
/// candidate
pub fn check_kernel_timestamps(
    params: &ConsensusParams,
    block_from_time: u32,
    prev_tx_time: u32,
    candidate_time: u32,
) -> KernelResult<()> {
    if candidate_time < prev_tx_time || candidate_time < block_from_time {
        return Err(KernelError::InvalidTimestamp(format!(
            "kernel time {candidate_time} precedes staked output time {prev_tx_time}"
        )));
    }
    if u64::from(block_from_time) + u64::from(params.stake_min_age) > u64::from(candidate_time) {
        return Err(KernelError::InvalidTimestamp(format!(
            "stake minimum age not reached: block from {block_from_time}, kernel {candidate_time}"
        )));
    }
    Ok(())
}

/// Score a fully assembled candidate against its weighted target
pub fn evaluate_kernel(
    params: &ConsensusParams,
    candidate: &KernelCandidate<'_>,
) -> KernelResult<KernelProof> {
    check_kernel_timestamps(
        params,
        candidate.block_from.time,
        candidate.prev_tx_time,
        candidate.candidate_time,
    )?;
    score_kernel(params, candidate)
}

fn score_kernel(
    params: &ConsensusParams,
    candidate: &KernelCandidate<'_>,
) -> KernelResult<KernelProof> {
    let weight = kernel_weight(
        params,
        candidate.prev_amount,
        candidate.prev_tx_time,
        candidate.candidate_time,
    );
    let hash = kernel_hash(params, candidate);
    let target = weighted_target(candidate.target_bits, weight);

    trace!(
        "Kernel {} weight {} against bits {:#010x}",
        hash_to_hex(&hash),
        weight,
        candidate.target_bits
    );

    if weight == 0 || U512::from(hash_to_u256(&hash)) > target {
        return Err(KernelError::KernelAboveTarget { hash, weight });
    }

    Ok(KernelProof {
        hash,
        weight,
        stake_modifier: candidate.stake_modifier,
    })
}

/// Check the kernel of a coinstake at `candidate_time` on top of `prev`,
/// staking output `prevout` of `tx_prev` from `block_from`.
///
/// Looks up the kernel stake modifier, so `block_from` must be indexed and
/// enough history must follow it.
#[allow(clippy::too_many_arguments)]
pub fn check_stake_kernel_hash(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: BlockId,
    target_bits: u32,
    block_from: &BlockHeader,
    tx_prev_offset: u32,
    tx_prev: &Transaction,
    prevout: &OutPoint,
    candidate_time: u32,
) -> KernelResult<KernelProof> {
    check_kernel_timestamps(params, block_from.time, tx_prev.time, candidate_time)?;

    let output = tx_prev
        .output(prevout.vout)
        .ok_or_else(|| KernelError::missing_input(*prevout))?;
    let from_id = chain.lookup(&block_from.hash()).ok_or_else(|| {
        KernelError::ModifierUnavailable(format!(
            "block {} holding the stake is not indexed",
            hash_to_hex(&block_from.hash())
        ))
    })?;
    let stake_modifier = kernel_stake_modifier(params, chain, prev, from_id, candidate_time)?;

    let candidate = KernelCandidate {
        block_from,
        stake_modifier,
        target_bits,
        prev_tx_time: tx_prev.time,
        prev_amount: output.value,
        prevout: *prevout,
        candidate_time,
        tx_prev_offset,
    };
    let proof = score_kernel(params, &candidate)?;

    debug!(
        "Kernel {} accepted for {} (modifier {:#018x}, weight {})",
        hash_to_hex(&proof.hash),
        prevout,
        stake_modifier,
        proof.weight
    );
    Ok(proof)
}

/// Whether a coinstake timestamp fits the block carrying it
pub fn check_coin_stake_timestamp(params: &ConsensusParams, block_time: u32, tx_time: u32) -> bool {
    if is_protocol_v09(params, tx_time)
        && (block_time & STAKE_TIMESTAMP_MASK != 0 || tx_time & STAKE_TIMESTAMP_MASK != 0)
    {
        return false;
    }

    if is_protocol_v03(params, tx_time) {
        tx_time <= block_time
            && u64::from(block_time) <= u64::from(tx_time) + u64::from(params.coinstake_max_drift)
    } else {
        block_time == tx_time
    }
}
