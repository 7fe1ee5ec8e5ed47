//! Stake modifier generation
//!
//! The modifier is a 64-bit value regenerated once per modifier interval.
//! Each regeneration runs up to 64 selection rounds over the blocks of a
//! trailing selection window; round `r` picks the unselected block with the
//! lowest selection hash among those inside the first `r + 1` sections of
//! the window and takes its entropy bit as bit `r` of the new modifier.
//! Sections grow towards the end of the window, so early rounds choose from
//! few blocks and later rounds from many.
//!
//! Between regenerations the predecessor's modifier is carried forward,
//! which is decided from the predecessor's record alone.

use crate::config::ConsensusParams;
use crate::consensus::entropy::modifier_interval_start;
use crate::consensus::protocol::{is_protocol_v04, is_protocol_v05};
use crate::error::{KernelError, KernelResult};
use crate::hash::{hash_to_hex, hash_to_u256, Hash256, HashWriter};
use crate::storage::{AncestorWalk, BlockId, BlockIndexEntry, ChainView, StakeModifierRecord};
use primitive_types::U256;
use tracing::{debug, trace};

/// Ratio of the selection window's last section to its first
pub const MODIFIER_INTERVAL_RATIO: i64 = 3;

/// Number of selection rounds, one per modifier bit
const MODIFIER_BITS: usize = 64;

/// Length in seconds of section `section` (0..64) of the selection window
pub fn selection_interval_section(modifier_interval: u32, section: u32) -> i64 {
    let section = i64::from(section.min(63));
    i64::from(modifier_interval) * 63 / (63 + (63 - section) * (MODIFIER_INTERVAL_RATIO - 1))
}

/// Total length in seconds of the selection window
pub fn selection_interval(modifier_interval: u32) -> i64 {
    (0..MODIFIER_BITS as u32)
        .map(|section| selection_interval_section(modifier_interval, section))
        .sum()
}

fn unavailable(reason: String) -> KernelError {
    KernelError::ModifierUnavailable(reason)
}

fn entry_or_unavailable<'a>(
    chain: &'a dyn ChainView,
    id: BlockId,
) -> KernelResult<&'a BlockIndexEntry> {
    chain
        .entry(id)
        .ok_or_else(|| unavailable(format!("no block index entry {id}")))
}

fn record_of(entry: &BlockIndexEntry) -> KernelResult<StakeModifierRecord> {
    entry.stake().map(|s| s.modifier).ok_or_else(|| {
        unavailable(format!(
            "block {} at height {} has no stake state",
            hash_to_hex(&entry.hash),
            entry.height
        ))
    })
}

/// Modifier for the block following `prev`, and whether it is freshly
/// generated.
///
/// Without a predecessor (genesis) the modifier is zero. An empty selection
/// window carries the previous modifier forward.
pub fn compute_next_stake_modifier(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: Option<BlockId>,
    candidate_time: u32,
) -> KernelResult<(u64, bool)> {
    let Some(prev_id) = prev else {
        return Ok((0, false));
    };
    let prev = entry_or_unavailable(chain, prev_id)?;
    let last = record_of(prev)?;
    let interval = params.modifier_interval.max(1);

    if last.interval_start / interval >= prev.time / interval {
        return Ok((last.value, false));
    }
    if is_protocol_v04(params, candidate_time)
        && last.interval_start / interval >= candidate_time / interval
    {
        return Ok((last.value, false));
    }

    let window_start =
        i64::from(modifier_interval_start(params, prev.time)) - selection_interval(interval);
    let mut candidates: Vec<&BlockIndexEntry> = AncestorWalk::new(chain, Some(prev_id))
        .take_while(|entry| i64::from(entry.time) >= window_start)
        .collect();
    if candidates.is_empty() {
        return Ok((last.value, false));
    }
    candidates.sort_by_cached_key(|entry| (entry.time, hash_to_u256(&entry.hash)));

    let rounds = candidates.len().min(MODIFIER_BITS);
    let mut selected = vec![false; candidates.len()];
    let mut modifier = 0u64;
    let mut stop = window_start;

    for round in 0..rounds {
        stop += selection_interval_section(interval, round as u32);
        let winner = select_block(&candidates, &selected, stop, last.value)?;
        selected[winner] = true;

        let entry = candidates[winner];
        let bit = entry.stake().map_or(0, |s| s.entropy_bit & 1);
        modifier |= u64::from(bit) << round;
        trace!(
            "Modifier round {}: selected height {} (stop {}, bit {})",
            round,
            entry.height,
            stop,
            bit
        );
    }

    debug!(
        "Generated stake modifier {:#018x} at height {} from {} candidates",
        modifier,
        prev.height + 1,
        candidates.len()
    );
    Ok((modifier, true))
}

/// Hash that ranks a candidate in a selection round; lower wins
fn selection_hash(proof_hash: &Hash256, prev_modifier: u64, proof_of_stake: bool) -> U256 {
    let mut writer = HashWriter::new();
    writer.write_hash(proof_hash).write_u64(prev_modifier);
    let hash = hash_to_u256(&writer.finish());
    if proof_of_stake {
        hash >> 32
    } else {
        hash
    }
}

/// Index of the best unselected candidate up to `stop`.
///
/// The first unselected candidate is taken even when it lies past `stop`,
/// so a round always has a winner while candidates remain.
fn select_block(
    candidates: &[&BlockIndexEntry],
    selected: &[bool],
    stop: i64,
    prev_modifier: u64,
) -> KernelResult<usize> {
    let mut best: Option<(usize, U256)> = None;

    for (idx, entry) in candidates.iter().enumerate() {
        if best.is_some() && i64::from(entry.time) > stop {
            break;
        }
        if selected[idx] {
            continue;
        }
        let proof_hash = entry.proof_hash().ok_or_else(|| {
            unavailable(format!(
                "selection candidate at height {} has no stake state",
                entry.height
            ))
        })?;
        let score = selection_hash(&proof_hash, prev_modifier, entry.proof_of_stake);
        match best {
            Some((_, best_score)) if score >= best_score => {}
            _ => best = Some((idx, score)),
        }
    }

    best.map(|(idx, _)| idx)
        .ok_or_else(|| unavailable("no selection candidate left".to_string()))
}

/// Full modifier record for a block at `candidate_time` following `prev`
pub fn next_stake_modifier_record(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: Option<BlockId>,
    candidate_time: u32,
) -> KernelResult<StakeModifierRecord> {
    let (value, generated) = compute_next_stake_modifier(params, chain, prev, candidate_time)?;

    let interval_start = match prev {
        Some(prev_id) if !generated => {
            record_of(entry_or_unavailable(chain, prev_id)?)?.interval_start
        }
        _ => modifier_interval_start(params, candidate_time),
    };

    Ok(StakeModifierRecord {
        value,
        generated,
        interval_start,
    })
}

/// Modifier a kernel staking an output from `block_from` must hash with,
/// for a coinstake at `candidate_time` on top of `prev`.
///
/// From V05 this is the modifier in effect one selection interval inside
/// the stake minimum age before the candidate. Earlier it is the first
/// modifier generated at least one selection interval after `block_from`.
pub fn kernel_stake_modifier(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: BlockId,
    block_from: BlockId,
    candidate_time: u32,
) -> KernelResult<u64> {
    if is_protocol_v05(params, candidate_time) {
        kernel_stake_modifier_v05(params, chain, prev, candidate_time)
    } else {
        kernel_stake_modifier_v03(params, chain, prev, block_from)
    }
}

fn kernel_stake_modifier_v05(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: BlockId,
    candidate_time: u32,
) -> KernelResult<u64> {
    let lag = i64::from(params.stake_min_age) - selection_interval(params.modifier_interval);
    let candidate_time = i64::from(candidate_time);

    let mut current = entry_or_unavailable(chain, prev)?;
    let mut modifier_time = i64::from(current.time);
    if modifier_time + lag <= candidate_time {
        return Err(unavailable(format!(
            "best block at height {} is too old for a kernel at {}",
            current.height, candidate_time
        )));
    }

    while modifier_time + lag > candidate_time {
        let prev_id = current.prev.ok_or_else(|| {
            unavailable(format!("reached genesis looking for a modifier before {candidate_time}"))
        })?;
        current = entry_or_unavailable(chain, prev_id)?;
        if current.generated_stake_modifier() {
            modifier_time = i64::from(current.time);
        }
    }

    Ok(record_of(current)?.value)
}

fn kernel_stake_modifier_v03(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: BlockId,
    block_from: BlockId,
) -> KernelResult<u64> {
    let from = entry_or_unavailable(chain, block_from)?;
    if chain.ancestor(prev, from.height) != Some(block_from) {
        return Err(unavailable(format!(
            "block {} is not an ancestor of the candidate",
            hash_to_hex(&from.hash)
        )));
    }

    let mut forward: Vec<&BlockIndexEntry> = AncestorWalk::new(chain, Some(prev))
        .take_while(|entry| entry.height > from.height)
        .collect();
    forward.reverse();

    let horizon = i64::from(from.time) + selection_interval(params.modifier_interval);
    let mut modifier_time = i64::from(from.time);
    let mut current = from;
    let mut path = forward.into_iter();

    while modifier_time < horizon {
        current = path.next().ok_or_else(|| {
            unavailable(format!(
                "no modifier generated one selection interval after height {}",
                from.height
            ))
        })?;
        if current.generated_stake_modifier() {
            modifier_time = i64::from(current.time);
        }
    }

    Ok(record_of(current)?.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkType;
    use crate::hash::{sha256d, ZERO_HASH};
    use crate::storage::{BlockIndex, PrevOutput, StakeState};
    use crate::test_common::{connected_chain, test_params};
    use crate::types::{BlockHeader, OutPoint};

    /// Bare index view: no transactions, stake state committed by hand
    struct IndexView(BlockIndex);

    impl ChainView for IndexView {
        fn entry(&self, id: BlockId) -> Option<&BlockIndexEntry> {
            self.0.get(id)
        }

        fn lookup(&self, hash: &Hash256) -> Option<BlockId> {
            self.0.lookup(hash)
        }

        fn resolve_prevout(&self, _outpoint: &OutPoint) -> Option<PrevOutput> {
            None
        }
    }

    const SEED_MODIFIER: u64 = 0x0123_4567_89ab_cdef;

    /// 100 blocks, two per 50s timestamp, every third block from height 1
    /// proof-of-stake, all carrying `SEED_MODIFIER` from interval zero
    fn mixed_history() -> (IndexView, BlockId) {
        let mut index = BlockIndex::new();
        let mut prev_hash = ZERO_HASH;
        let mut tip = None;
        for height in 0..100u32 {
            let time = 1_200_000 + 50 * (height / 2);
            let header = BlockHeader::new(1, prev_hash, ZERO_HASH, time, 0x1d00ffff, 0);
            let proof_of_stake = height % 3 == 1;
            let id = index.insert(&header, proof_of_stake).unwrap();
            prev_hash = header.hash();

            let hash_proof_of_stake = if proof_of_stake {
                sha256d(&height.to_le_bytes())
            } else {
                ZERO_HASH
            };
            let proof_hash = if proof_of_stake { hash_proof_of_stake } else { prev_hash };
            index
                .get(id)
                .unwrap()
                .commit_stake(StakeState {
                    modifier: StakeModifierRecord {
                        value: SEED_MODIFIER,
                        generated: false,
                        interval_start: 0,
                    },
                    entropy_bit: proof_hash[0] & 1,
                    hash_proof_of_stake,
                    checksum: 0,
                })
                .unwrap();
            tip = Some(id);
        }
        (IndexView(index), tip.unwrap())
    }

    #[test]
    fn test_generated_modifier_vector() {
        // Window opens at 1_200_313, first candidates share time 1_200_350
        // past the first stop, and the later equal-time pairs sort by hash
        let params = test_params();
        let (view, tip) = mixed_history();
        let candidate_time = view.entry(tip).unwrap().time + 60;

        assert_eq!(
            compute_next_stake_modifier(&params, &view, Some(tip), candidate_time).unwrap(),
            (0x3f39_db0a_89ef_a05d, true)
        );
    }

    #[test]
    fn test_selection_sections_grow() {
        assert_eq!(selection_interval_section(21_600, 0), 21_600 * 63 / 189);
        assert_eq!(selection_interval_section(21_600, 63), 21_600);
        for section in 1..64 {
            assert!(
                selection_interval_section(21_600, section)
                    >= selection_interval_section(21_600, section - 1)
            );
        }
    }

    #[test]
    fn test_selection_interval_totals() {
        assert_eq!(selection_interval(60), 2_087);
        assert_eq!(selection_interval(1_200), 42_301);
        assert_eq!(selection_interval(21_600), 761_920);
    }

    #[test]
    fn test_genesis_modifier_is_zero() {
        let params = test_params();
        let (chain, _) = connected_chain(&params, 1);
        assert_eq!(
            compute_next_stake_modifier(&params, &chain, None, 1_000).unwrap(),
            (0, false)
        );
    }

    #[test]
    fn test_carry_forward_within_interval() {
        let mut params = test_params();
        params.modifier_interval = 600;
        let (chain, ids) = connected_chain(&params, 3);

        // Blocks 60s apart inside one 600s interval never regenerate
        let prev = chain.entry(ids[2]).unwrap();
        let (value, generated) =
            compute_next_stake_modifier(&params, &chain, Some(ids[2]), prev.time + 60).unwrap();
        assert!(!generated);
        assert_eq!(value, prev.stake_modifier().unwrap());
    }

    #[test]
    fn test_generates_when_interval_passes() {
        let params = test_params();
        let (chain, ids) = connected_chain(&params, 40);

        let tip = chain.entry(ids[39]).unwrap();
        let next = tip.time + params.modifier_interval;
        let (first, generated) =
            compute_next_stake_modifier(&params, &chain, Some(ids[39]), next).unwrap();
        assert!(generated);

        // Same inputs, same output
        let (second, _) =
            compute_next_stake_modifier(&params, &chain, Some(ids[39]), next).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_v04_blocks_same_interval_regeneration() {
        let params = test_params();
        let (chain, ids) = connected_chain(&params, 4);
        let tip = chain.entry(ids[3]).unwrap();
        let record = tip.stake().unwrap().modifier;
        let interval = params.modifier_interval;
        assert!(record.interval_start / interval < tip.time / interval);

        // Candidate dated back into the interval the modifier came from
        let candidate = record.interval_start + 1;
        let (value, generated) =
            compute_next_stake_modifier(&params, &chain, Some(ids[3]), candidate).unwrap();
        assert!(!generated);
        assert_eq!(value, record.value);

        let mut legacy = params.clone();
        legacy.activation.v04 = u32::MAX;
        let (_, generated) =
            compute_next_stake_modifier(&legacy, &chain, Some(ids[3]), candidate).unwrap();
        assert!(generated);
    }

    #[test]
    fn test_record_keeps_interval_of_generation() {
        let mut params = test_params();
        params.modifier_interval = 600;
        let (chain, ids) = connected_chain(&params, 3);
        let prev = chain.entry(ids[2]).unwrap();
        let record =
            next_stake_modifier_record(&params, &chain, Some(ids[2]), prev.time + 1).unwrap();
        assert!(!record.generated);
        assert_eq!(record.interval_start, prev.stake().unwrap().modifier.interval_start);
    }

    #[test]
    fn test_missing_stake_state_is_unavailable() {
        let params = test_params();
        let (chain, ids) = crate::test_common::unconnected_chain(3);
        assert!(matches!(
            compute_next_stake_modifier(&params, &chain, Some(ids[2]), 10_000),
            Err(KernelError::ModifierUnavailable(_))
        ));
    }

    #[test]
    fn test_kernel_modifier_v05_lags_behind_candidate() {
        let params = test_params();
        let (chain, ids) = connected_chain(&params, 80);
        let tip = chain.entry(ids[79]).unwrap();
        let candidate = tip.time + 60;

        let modifier = kernel_stake_modifier(&params, &chain, ids[79], ids[0], candidate).unwrap();

        let lag = i64::from(params.stake_min_age) - selection_interval(params.modifier_interval);
        let source = AncestorWalk::new(&chain, Some(ids[79]))
            .find(|e| e.generated_stake_modifier() && i64::from(e.time) + lag <= i64::from(candidate))
            .unwrap();
        assert_eq!(modifier, source.stake_modifier().unwrap());
    }

    #[test]
    fn test_kernel_modifier_v05_rejects_stale_tip() {
        let params = test_params();
        let (chain, ids) = connected_chain(&params, 80);
        let tip = chain.entry(ids[79]).unwrap();
        let candidate = tip.time + params.stake_min_age;
        assert!(matches!(
            kernel_stake_modifier(&params, &chain, ids[79], ids[0], candidate),
            Err(KernelError::ModifierUnavailable(_))
        ));
    }

    #[test]
    fn test_kernel_modifier_v03_walks_forward_from_block_from() {
        let mut params = ConsensusParams::for_network(NetworkType::Regtest);
        params.activation.v05 = u32::MAX;
        params.activation.v06 = u32::MAX;
        params.activation.v07 = u32::MAX;
        params.activation.btc16 = u32::MAX;
        params.activation.v09 = u32::MAX;
        let (chain, ids) = connected_chain(&params, 80);

        let from = chain.entry(ids[5]).unwrap();
        let horizon = i64::from(from.time) + selection_interval(params.modifier_interval);
        let expected = AncestorWalk::new(&chain, Some(ids[79]))
            .filter(|e| e.height > 5 && e.generated_stake_modifier() && i64::from(e.time) >= horizon)
            .last()
            .unwrap()
            .stake_modifier()
            .unwrap();

        let tip_time = chain.entry(ids[79]).unwrap().time;
        let modifier = kernel_stake_modifier(&params, &chain, ids[79], ids[5], tip_time).unwrap();
        assert_eq!(modifier, expected);

        // Not enough history after the staked block
        assert!(matches!(
            kernel_stake_modifier(&params, &chain, ids[79], ids[70], tip_time),
            Err(KernelError::ModifierUnavailable(_))
        ));
    }
}
