//! Arena of block-index entries
//!
//! Entries are addressed by [`BlockId`], a stable position in the arena, and
//! link to their predecessor by id. Header fields are fixed when an entry
//! is inserted; the stake fields this engine owns live in a `OnceLock` and
//! can be written exactly once.

use crate::hash::{Hash256, ZERO_HASH};
use crate::storage::chain_state::{ChainStateError, ChainStateResult};
use crate::types::BlockHeader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Entry flag: block is proof-of-stake
pub const BLOCK_PROOF_OF_STAKE: u32 = 1 << 0;
/// Entry flag: block's stake entropy bit is one
pub const BLOCK_STAKE_ENTROPY: u32 = 1 << 1;
/// Entry flag: block generated a new stake modifier
pub const BLOCK_STAKE_MODIFIER: u32 = 1 << 2;

/// Stable arena key of a block-index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stake modifier in effect at a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeModifierRecord {
    pub value: u64,
    /// True when this block regenerated the modifier, false when it was
    /// carried forward from the predecessor
    pub generated: bool,
    /// Start of the modifier interval in which `value` was generated
    pub interval_start: u32,
}

/// Stake-derived values computed once when a block is connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeState {
    pub modifier: StakeModifierRecord,
    pub entropy_bit: u8,
    /// Kernel hash of the coinstake; zero for proof-of-work blocks
    pub hash_proof_of_stake: Hash256,
    pub checksum: u32,
}

/// One block in the index
#[derive(Debug)]
pub struct BlockIndexEntry {
    pub id: BlockId,
    pub height: u32,
    pub hash: Hash256,
    pub prev: Option<BlockId>,
    pub time: u32,
    pub version: i32,
    pub bits: u32,
    pub proof_of_stake: bool,
    stake: OnceLock<StakeState>,
}

impl BlockIndexEntry {
    /// Stake state, once the block has been connected
    pub fn stake(&self) -> Option<&StakeState> {
        self.stake.get()
    }

    pub fn stake_modifier(&self) -> Option<u64> {
        self.stake().map(|s| s.modifier.value)
    }

    pub fn generated_stake_modifier(&self) -> bool {
        self.stake().is_some_and(|s| s.modifier.generated)
    }

    /// Hash a stake-modifier selection scores this block by: the kernel
    /// hash for proof-of-stake blocks, the block hash otherwise
    pub fn proof_hash(&self) -> Option<Hash256> {
        self.stake().map(|s| {
            if self.proof_of_stake {
                s.hash_proof_of_stake
            } else {
                self.hash
            }
        })
    }

    /// One-time initialisation of the stake fields
    pub fn commit_stake(&self, state: StakeState) -> ChainStateResult<()> {
        self.stake
            .set(state)
            .map_err(|_| ChainStateError::StakeAlreadyCommitted(self.height))
    }
}

/// Flag word for a block with the given stake properties
pub fn flags_for(proof_of_stake: bool, entropy_bit: u8, generated: bool) -> u32 {
    let mut flags = 0;
    if proof_of_stake {
        flags |= BLOCK_PROOF_OF_STAKE;
    }
    if entropy_bit & 1 == 1 {
        flags |= BLOCK_STAKE_ENTROPY;
    }
    if generated {
        flags |= BLOCK_STAKE_MODIFIER;
    }
    flags
}

/// Arena of entries plus a hash lookup
#[derive(Debug, Default)]
pub struct BlockIndex {
    entries: Vec<BlockIndexEntry>,
    by_hash: HashMap<Hash256, BlockId>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header. Its predecessor must already be indexed unless it is
    /// the first (genesis) entry.
    pub fn insert(&mut self, header: &BlockHeader, proof_of_stake: bool) -> ChainStateResult<BlockId> {
        let hash = header.hash();
        if self.by_hash.contains_key(&hash) {
            return Err(ChainStateError::BlockAlreadyExists(hex::encode(hash)));
        }

        let (prev, height) = if header.prev_block_hash == ZERO_HASH {
            if !self.entries.is_empty() {
                return Err(ChainStateError::InvalidBlock(
                    "second genesis block".to_string(),
                ));
            }
            (None, 0)
        } else {
            let prev_id = *self
                .by_hash
                .get(&header.prev_block_hash)
                .ok_or_else(|| ChainStateError::BlockNotFound(hex::encode(header.prev_block_hash)))?;
            (Some(prev_id), self.entries[prev_id.index()].height + 1)
        };

        let id = BlockId(
            u32::try_from(self.entries.len())
                .map_err(|_| ChainStateError::InvalidBlock("index full".to_string()))?,
        );
        self.entries.push(BlockIndexEntry {
            id,
            height,
            hash,
            prev,
            time: header.time,
            version: header.version,
            bits: header.bits,
            proof_of_stake,
            stake: OnceLock::new(),
        });
        self.by_hash.insert(hash, id);
        Ok(id)
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockIndexEntry> {
        self.entries.get(id.index())
    }

    pub fn lookup(&self, hash: &Hash256) -> Option<BlockId> {
        self.by_hash.get(hash).copied()
    }
}
