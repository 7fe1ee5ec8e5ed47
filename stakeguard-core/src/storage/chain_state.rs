//! Chain state as the kernel engine sees it
//!
//! [`ChainView`] is the read interface: entries by id or hash, ancestors,
//! previous-output resolution and the write-once stake commit. It has no
//! notion of a tip; every operation takes the predecessor it builds on.
//! [`MemoryChainState`] backs it with full blocks and a transaction index.

use crate::hash::{hash_to_hex, Hash256};
use crate::storage::block_index::{BlockId, BlockIndex, BlockIndexEntry, StakeState};
use crate::types::{Block, BlockHeader, OutPoint, Transaction, TxOut};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in chain state operations
#[derive(Debug, Error)]
pub enum ChainStateError {
    #[error("Block already exists in chain state: {0}")]
    BlockAlreadyExists(String),

    #[error("Block not found in chain state: {0}")]
    BlockNotFound(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Unknown block index entry {0}")]
    UnknownEntry(BlockId),

    #[error("Stake state already committed for block at height {0}")]
    StakeAlreadyCommitted(u32),
}

/// Result type for chain state operations
pub type ChainStateResult<T> = Result<T, ChainStateError>;

/// A resolved previous output together with the block that contains it
#[derive(Debug, Clone)]
pub struct PrevOutput {
    pub tx: Transaction,
    pub output: TxOut,
    pub block_id: BlockId,
    pub block_from: BlockHeader,
    pub block_height: u32,
    /// Offset of `tx` from the start of the serialized containing block
    pub tx_offset: u32,
}

/// Read view of the chain state collaborator.
///
/// Lookups borrow from the view; the only mutation is the write-once stake
/// commit, which goes through `&self` and fails rather than overwrite.
/// Callers are responsible for serializing block connection.
pub trait ChainView {
    /// Entry by arena id
    fn entry(&self, id: BlockId) -> Option<&BlockIndexEntry>;

    /// Entry id by block hash
    fn lookup(&self, hash: &Hash256) -> Option<BlockId>;

    /// Resolve an outpoint to its transaction, output and containing block
    fn resolve_prevout(&self, outpoint: &OutPoint) -> Option<PrevOutput>;

    /// Store the stake state of a newly connected block
    fn commit_stake(&self, id: BlockId, state: StakeState) -> ChainStateResult<()> {
        self.entry(id)
            .ok_or(ChainStateError::UnknownEntry(id))?
            .commit_stake(state)
    }

    /// Ancestor of `from` at `height`, walking predecessor links
    fn ancestor(&self, from: BlockId, height: u32) -> Option<BlockId> {
        let mut current = self.entry(from)?;
        if height > current.height {
            return None;
        }
        while current.height > height {
            current = self.entry(current.prev?)?;
        }
        Some(current.id)
    }
}

/// Lazy walk from an entry back towards genesis.
///
/// Finite by construction: every step moves to a strictly lower height, and
/// callers bound it further with `take_while` on time or height.
pub struct AncestorWalk<'a> {
    chain: &'a dyn ChainView,
    next: Option<BlockId>,
}

impl<'a> AncestorWalk<'a> {
    pub fn new(chain: &'a dyn ChainView, start: Option<BlockId>) -> Self {
        Self { chain, next: start }
    }
}

impl<'a> Iterator for AncestorWalk<'a> {
    type Item = &'a BlockIndexEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.chain.entry(self.next?)?;
        self.next = entry.prev;
        Some(entry)
    }
}

#[derive(Debug, Clone, Copy)]
struct TxLocation {
    block: BlockId,
    position: usize,
}

/// In-memory chain state: block-index arena, full blocks and a transaction
/// index. Blocks must be added in parent-before-child order.
#[derive(Debug, Default)]
pub struct MemoryChainState {
    index: BlockIndex,
    blocks: HashMap<BlockId, Block>,
    tx_index: HashMap<Hash256, TxLocation>,
}

impl MemoryChainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a block and its transactions
    pub fn add_block(&mut self, block: Block) -> ChainStateResult<BlockId> {
        let id = self.index.insert(&block.header, block.is_proof_of_stake())?;

        for (position, tx) in block.transactions.iter().enumerate() {
            self.tx_index
                .insert(tx.txid(), TxLocation { block: id, position });
        }

        let height = self.index.get(id).map_or(0, |e| e.height);

        debug!(
            "Indexed block {} at height {} ({} transactions)",
            hash_to_hex(&block.hash()),
            height,
            block.transactions.len()
        );
        self.blocks.insert(id, block);
        Ok(id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }
}

impl ChainView for MemoryChainState {
    fn entry(&self, id: BlockId) -> Option<&BlockIndexEntry> {
        self.index.get(id)
    }

    fn lookup(&self, hash: &Hash256) -> Option<BlockId> {
        self.index.lookup(hash)
    }

    fn resolve_prevout(&self, outpoint: &OutPoint) -> Option<PrevOutput> {
        let location = self.tx_index.get(&outpoint.txid)?;
        let block = self.blocks.get(&location.block)?;
        let tx = block.transactions.get(location.position)?;
        let output = tx.output(outpoint.vout)?.clone();

        Some(PrevOutput {
            tx: tx.clone(),
            output,
            block_id: location.block,
            block_from: block.header.clone(),
            block_height: self.index.get(location.block)?.height,
            tx_offset: block.tx_offset(location.position)?,
        })
    }
}
