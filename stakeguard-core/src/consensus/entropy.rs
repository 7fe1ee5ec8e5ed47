//! Stake entropy bit
//!
//! Every connected block contributes one bit that modifier generation may
//! select. Before V04 the bit comes from the coinbase signature script
//! mixed with the modifier interval the block falls in; from V04 it is the
//! lowest bit of the block's proof hash.

use crate::config::ConsensusParams;
use crate::consensus::protocol::is_protocol_v04;
use crate::hash::{hash160, Hash256, HashWriter};
use crate::types::Block;
use tracing::trace;

/// Start of the modifier interval containing `time`
pub fn modifier_interval_start(params: &ConsensusParams, time: u32) -> u32 {
    let interval = params.modifier_interval.max(1);
    time - time % interval
}

/// Low bit of a 32-byte hash in its numeric (little-endian) reading
pub fn stake_entropy_bit_from_hash(hash: &Hash256) -> u8 {
    hash[0] & 1
}

/// Entropy bit of `block`.
///
/// `proof_hash` is the kernel hash for proof-of-stake blocks and the block
/// hash otherwise; it is only consulted under V04.
pub fn stake_entropy_bit(params: &ConsensusParams, block: &Block, proof_hash: &Hash256) -> u8 {
    let time = block.time();
    let bit = if is_protocol_v04(params, time) {
        stake_entropy_bit_from_hash(proof_hash)
    } else {
        let script_sig = block
            .coinbase()
            .and_then(|tx| tx.inputs.first())
            .map_or(&[][..], |input| input.script_sig.as_slice());

        let mut writer = HashWriter::new();
        writer.write_bytes(script_sig);
        writer.write_u32(modifier_interval_start(params, time));
        hash160(writer.as_bytes())[0] & 1
    };

    trace!("Entropy bit {} for block at time {}", bit, time);
    bit
}
