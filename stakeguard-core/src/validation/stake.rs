//! Coinstake validation and stake-state connection
//!
//! A coinstake is checked in a fixed order and the first failing step is
//! the rejection reason:
//!
//! `Start → TimestampChecked → PrevOutputResolved → WeightComputed →
//! KernelEvaluated → SignatureChecked → Accepted | Rejected`
//!
//! Connecting a block is the only place stake state is written. It derives
//! the entropy bit, the next modifier and the chained checksum, checks the
//! checkpoint table and commits all of it to the block's index entry once.

use crate::consensus::checkpoint::{stake_modifier_checksum, CheckpointVerifier};
use crate::consensus::entropy::stake_entropy_bit;
use crate::consensus::kernel::{check_coin_stake_timestamp, check_stake_kernel_hash};
use crate::consensus::modifier::next_stake_modifier_record;
use crate::consensus::protocol::ProtocolRules;
use crate::error::{InputFailure, KernelError, KernelResult};
use crate::hash::{hash_to_hex, Hash256, ZERO_HASH};
use crate::storage::{flags_for, BlockId, ChainStateError, StakeState};
use crate::types::{Block, Transaction};
use crate::validation::ValidationContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Progress of a coinstake through validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStage {
    Start,
    TimestampChecked,
    PrevOutputResolved,
    WeightComputed,
    KernelEvaluated,
    SignatureChecked,
    Accepted,
    Rejected,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationStage::Start => "start",
            ValidationStage::TimestampChecked => "timestamp checked",
            ValidationStage::PrevOutputResolved => "previous output resolved",
            ValidationStage::WeightComputed => "weight computed",
            ValidationStage::KernelEvaluated => "kernel evaluated",
            ValidationStage::SignatureChecked => "signature checked",
            ValidationStage::Accepted => "accepted",
            ValidationStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Result of an accepted coinstake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeProof {
    /// Kernel hash, to be stored with the block as its proof
    pub hash_proof_of_stake: Hash256,
    /// Modifier the kernel was hashed with
    pub kernel_modifier: u64,
    pub weight: u64,
}

/// Single-pass validation of one coinstake
pub struct StakeValidation<'a> {
    ctx: ValidationContext<'a>,
    stage: ValidationStage,
}

impl<'a> StakeValidation<'a> {
    pub fn new(ctx: ValidationContext<'a>) -> Self {
        Self {
            ctx,
            stage: ValidationStage::Start,
        }
    }

    /// Last stage reached
    pub fn stage(&self) -> ValidationStage {
        self.stage
    }

    fn advance(&mut self, next: ValidationStage, txid: &Hash256) {
        debug!(
            "Coinstake {}: {} -> {}",
            hash_to_hex(txid),
            self.stage,
            next
        );
        self.stage = next;
    }

    /// Validate `tx` as the coinstake of a block at `block_time` with
    /// compact target `target_bits`, following `prev`
    pub fn run(
        &mut self,
        prev: BlockId,
        tx: &Transaction,
        target_bits: u32,
        block_time: u32,
    ) -> KernelResult<StakeProof> {
        let txid = tx.txid();
        self.stage = ValidationStage::Start;

        match self.evaluate(prev, tx, &txid, target_bits, block_time) {
            Ok(proof) => {
                self.advance(ValidationStage::Accepted, &txid);
                Ok(proof)
            }
            Err(err) => {
                warn!(
                    "Coinstake {} rejected after {}: {}",
                    hash_to_hex(&txid),
                    self.stage,
                    err
                );
                self.stage = ValidationStage::Rejected;
                Err(err)
            }
        }
    }

    fn evaluate(
        &mut self,
        prev: BlockId,
        tx: &Transaction,
        txid: &Hash256,
        target_bits: u32,
        block_time: u32,
    ) -> KernelResult<StakeProof> {
        let params = self.ctx.params;
        let chain = self.ctx.chain;

        let kernel = match tx.inputs.first() {
            Some(input) if tx.is_coinstake() => input,
            _ => return Err(KernelError::NotCoinStake(*txid)),
        };
        if !check_coin_stake_timestamp(params, block_time, tx.time) {
            return Err(KernelError::InvalidTimestamp(format!(
                "coinstake time {} does not fit block time {}",
                tx.time, block_time
            )));
        }
        self.advance(ValidationStage::TimestampChecked, txid);

        let prev_entry = chain.entry(prev).ok_or(ChainStateError::UnknownEntry(prev))?;
        let prev_out = chain
            .resolve_prevout(&kernel.prevout)
            .filter(|out| chain.ancestor(prev, out.block_height) == Some(out.block_id))
            .ok_or_else(|| KernelError::missing_input(kernel.prevout))?;

        let depth = (prev_entry.height + 1).saturating_sub(prev_out.block_height);
        if depth < params.stake_min_confirmations {
            return Err(KernelError::PrematureOrMissingInput {
                outpoint: kernel.prevout,
                failure: InputFailure::PrematureSpend {
                    depth,
                    required: params.stake_min_confirmations,
                },
            });
        }
        self.advance(ValidationStage::PrevOutputResolved, txid);

        let proof = check_stake_kernel_hash(
            params,
            chain,
            prev,
            target_bits,
            &prev_out.block_from,
            prev_out.tx_offset,
            &prev_out.tx,
            &kernel.prevout,
            tx.time,
        );
        // The weight is known even when the kernel misses its target
        let weight = match &proof {
            Ok(proof) => Some(proof.weight),
            Err(KernelError::KernelAboveTarget { weight, .. }) => Some(*weight),
            Err(_) => None,
        };
        if let Some(weight) = weight {
            debug!("Coinstake {} stake weight {}", hash_to_hex(txid), weight);
            self.advance(ValidationStage::WeightComputed, txid);
        }
        let proof = proof?;
        self.advance(ValidationStage::KernelEvaluated, txid);

        if !self.ctx.verifier.verify(tx, 0, &prev_out.output) {
            return Err(KernelError::InvalidSignature { input: 0 });
        }
        self.advance(ValidationStage::SignatureChecked, txid);

        Ok(StakeProof {
            hash_proof_of_stake: proof.hash,
            kernel_modifier: proof.stake_modifier,
            weight: proof.weight,
        })
    }
}

/// Validate the coinstake `tx` of a block at `block_time` following `prev`
pub fn check_proof_of_stake(
    ctx: &ValidationContext<'_>,
    prev: BlockId,
    tx: &Transaction,
    target_bits: u32,
    block_time: u32,
) -> KernelResult<StakeProof> {
    StakeValidation::new(*ctx).run(prev, tx, target_bits, block_time)
}

/// Compute and commit the stake state of indexed block `id`.
///
/// The coinstake of a proof-of-stake block is always validated here. A
/// caller that already holds the kernel hash may pass it as
/// `hash_proof_of_stake`; it must equal the recomputed hash or the block is
/// rejected. It is ignored for proof-of-work blocks. Fails without writing
/// anything when the proof or the checksum is rejected.
pub fn connect_block_stake(
    ctx: &ValidationContext<'_>,
    id: BlockId,
    block: &Block,
    hash_proof_of_stake: Option<Hash256>,
) -> KernelResult<StakeState> {
    let params = ctx.params;
    let chain = ctx.chain;
    let entry = chain.entry(id).ok_or(ChainStateError::UnknownEntry(id))?;

    if block.hash() != entry.hash {
        return Err(ChainStateError::InvalidBlock(format!(
            "block {} does not match index entry {}",
            hash_to_hex(&block.hash()),
            id
        ))
        .into());
    }

    let rules = ProtocolRules::at(params, chain, block.time(), entry.prev);
    debug!("Connecting stake state at height {} under {:?}", entry.height, rules);

    let proof_of_stake = if entry.proof_of_stake {
        let prev = entry.prev.ok_or_else(|| {
            ChainStateError::InvalidBlock("proof-of-stake genesis block".to_string())
        })?;
        let coinstake = block
            .coinstake()
            .ok_or_else(|| KernelError::NotCoinStake(block.hash()))?;
        let computed = check_proof_of_stake(ctx, prev, coinstake, block.header.bits, block.time())?
            .hash_proof_of_stake;
        match hash_proof_of_stake {
            Some(supplied) if supplied != computed => {
                warn!(
                    "Supplied proof-of-stake hash {} rejected at height {}",
                    hash_to_hex(&supplied),
                    entry.height
                );
                return Err(KernelError::ProofHashMismatch { supplied, computed });
            }
            _ => computed,
        }
    } else {
        ZERO_HASH
    };
    let proof_hash = if entry.proof_of_stake {
        proof_of_stake
    } else {
        entry.hash
    };

    let entropy_bit = stake_entropy_bit(params, block, &proof_hash);
    let modifier = next_stake_modifier_record(params, chain, entry.prev, block.time())?;

    let prev_checksum = match entry.prev {
        Some(prev) => Some(
            chain
                .entry(prev)
                .and_then(|e| e.stake())
                .map(|s| s.checksum)
                .ok_or_else(|| {
                    KernelError::ModifierUnavailable(format!(
                        "predecessor of height {} is not connected",
                        entry.height
                    ))
                })?,
        ),
        None => None,
    };
    let flags = flags_for(entry.proof_of_stake, entropy_bit, modifier.generated);
    let checksum = stake_modifier_checksum(prev_checksum, flags, &proof_of_stake, modifier.value);
    CheckpointVerifier::new(params).verify(entry.height, checksum)?;

    let state = StakeState {
        modifier,
        entropy_bit,
        hash_proof_of_stake: proof_of_stake,
        checksum,
    };
    chain.commit_stake(id, state)?;

    if modifier.generated {
        info!(
            "New stake modifier {:#018x} at height {}",
            modifier.value, entry.height
        );
    }
    debug!(
        "Connected stake state at height {}: checksum {:#010x}, entropy bit {}",
        entry.height, checksum, entropy_bit
    );
    Ok(state)
}
