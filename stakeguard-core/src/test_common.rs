//! Common test fixtures for the stakeguard-core crate
//! Chains are built on the regtest preset: every rule active, one minute
//! modifier interval, one hour minimum stake age.

#![cfg(test)]

use crate::config::{ConsensusParams, NetworkType};
use crate::hash::{Hash256, ZERO_HASH};
use crate::storage::{BlockId, ChainView, MemoryChainState};
use crate::types::{Amount, Block, OutPoint, Transaction, TxIn, TxOut};
use crate::validation::{connect_block_stake, SignatureVerifier, ValidationContext};

/// Time of every test genesis block (a multiple of 600 and of 16)
pub const GENESIS_TIME: u32 = 1_200_000;

/// Seconds between consecutive proof-of-work test blocks
pub const BLOCK_SPACING: u32 = 60;

/// Coinstake time that can stake early outputs of an 80-block chain
pub const STAKE_TIME: u32 = 1_204_800;

/// Target any kernel with non-zero weight meets
pub const EASY_BITS: u32 = 0x207f_ffff;

/// Target of one, which no realistic kernel meets
pub const HARD_BITS: u32 = 0x0300_0001;

pub const COINBASE_VALUE: Amount = Amount::from_coins(50);

/// Accepts every signature
pub struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _tx: &Transaction, _input_index: usize, _prev_output: &TxOut) -> bool {
        true
    }
}

/// Rejects every signature
pub struct RejectAll;

impl SignatureVerifier for RejectAll {
    fn verify(&self, _tx: &Transaction, _input_index: usize, _prev_output: &TxOut) -> bool {
        false
    }
}

pub fn test_params() -> ConsensusParams {
    ConsensusParams::for_network(NetworkType::Regtest)
}

/// Coinbase unique to `height`
pub fn coinbase(height: u32, time: u32) -> Transaction {
    Transaction::new(
        time,
        vec![TxIn::new(OutPoint::null(), height.to_le_bytes().to_vec())],
        vec![TxOut::new(COINBASE_VALUE, vec![0x51])],
    )
}

/// Coinstake spending `prevout` into a single paying output
pub fn coinstake(prevout: OutPoint, time: u32) -> Transaction {
    Transaction::new(
        time,
        vec![TxIn::new(prevout, vec![0x00])],
        vec![TxOut::empty(), TxOut::new(COINBASE_VALUE, vec![0x51])],
    )
}

pub fn pow_block(prev_hash: Hash256, height: u32, time: u32) -> Block {
    Block::new(1, prev_hash, time, EASY_BITS, vec![coinbase(height, time)])
}

/// Proof-of-stake block on top of `prev` staking `prevout`
pub fn pos_block(
    chain: &MemoryChainState,
    prev: BlockId,
    prevout: OutPoint,
    time: u32,
    bits: u32,
) -> Block {
    let entry = chain.entry(prev).unwrap();
    let height = entry.height + 1;
    let mut coinbase = coinbase(height, time);
    coinbase.outputs = vec![TxOut::empty()];
    Block::new(1, entry.hash, time, bits, vec![coinbase, coinstake(prevout, time)])
}

/// Indexed proof-of-work chain with the given block versions and no stake
/// state
pub fn test_chain_with_versions(
    versions: &[i32],
    start_time: u32,
) -> (MemoryChainState, Vec<BlockId>) {
    let mut chain = MemoryChainState::new();
    let mut prev_hash = ZERO_HASH;
    let mut ids = Vec::with_capacity(versions.len());
    for (height, version) in versions.iter().enumerate() {
        let height = height as u32;
        let time = start_time + height * BLOCK_SPACING;
        let block = Block::new(*version, prev_hash, time, EASY_BITS, vec![coinbase(height, time)]);
        prev_hash = block.hash();
        ids.push(chain.add_block(block).unwrap());
    }
    (chain, ids)
}

/// Indexed proof-of-work chain without stake state
pub fn unconnected_chain(length: usize) -> (MemoryChainState, Vec<BlockId>) {
    test_chain_with_versions(&vec![1; length], GENESIS_TIME)
}

/// Proof-of-work chain with every block's stake state connected
pub fn connected_chain(
    params: &ConsensusParams,
    length: u32,
) -> (MemoryChainState, Vec<BlockId>) {
    let mut chain = MemoryChainState::new();
    let mut prev_hash = ZERO_HASH;
    let mut ids = Vec::with_capacity(length as usize);
    for height in 0..length {
        let block = pow_block(prev_hash, height, GENESIS_TIME + height * BLOCK_SPACING);
        prev_hash = block.hash();
        let id = chain.add_block(block.clone()).unwrap();
        let ctx = ValidationContext::new(params, &chain, &AcceptAll);
        connect_block_stake(&ctx, id, &block, None).unwrap();
        ids.push(id);
    }
    (chain, ids)
}
