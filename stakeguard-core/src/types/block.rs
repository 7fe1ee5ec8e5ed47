use crate::hash::{sha256d, Hash256, ZERO_HASH};
use crate::types::encode::{compact_size_len, write_compact_size};
use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// BlockHeader structure representing the header of a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block version
    pub version: i32,

    /// Hash of the previous block header
    pub prev_block_hash: Hash256,

    /// Merkle root of the transactions in this block
    pub merkle_root: Hash256,

    /// Timestamp of the block (seconds since Unix epoch)
    pub time: u32,

    /// Target difficulty bits (compact encoding)
    pub bits: u32,

    /// Nonce, zero for proof-of-stake blocks
    pub nonce: u32,
}

impl BlockHeader {
    /// Serialized header size; transaction offsets inside a block start here
    pub const SERIALIZED_SIZE: u32 = 80;

    pub fn new(
        version: i32,
        prev_block_hash: Hash256,
        merkle_root: Hash256,
        time: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            prev_block_hash,
            merkle_root,
            time,
            bits,
            nonce,
        }
    }

    /// Calculate the hash of this block header
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.serialize())
    }

    /// Serialize this header for hashing (all fields little-endian)
    pub fn serialize(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(Self::SERIALIZED_SIZE as usize);
        buffer.extend_from_slice(&self.version.to_le_bytes());
        buffer.extend_from_slice(&self.prev_block_hash);
        buffer.extend_from_slice(&self.merkle_root);
        buffer.extend_from_slice(&self.time.to_le_bytes());
        buffer.extend_from_slice(&self.bits.to_le_bytes());
        buffer.extend_from_slice(&self.nonce.to_le_bytes());
        buffer
    }
}

/// A full block: header and transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block, filling in the merkle root from `transactions`
    pub fn new(
        version: i32,
        prev_block_hash: Hash256,
        time: u32,
        bits: u32,
        transactions: Vec<Transaction>,
    ) -> Self {
        let merkle_root = compute_merkle_root(&transactions);
        Self {
            header: BlockHeader::new(version, prev_block_hash, merkle_root, time, bits, 0),
            transactions,
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn time(&self) -> u32 {
        self.header.time
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// The coinstake sits right after the coinbase
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1).filter(|tx| tx.is_coinstake())
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.coinstake().is_some()
    }

    /// Byte offset of transaction `position` from the start of the
    /// serialized block (header, compact-size count, preceding transactions)
    pub fn tx_offset(&self, position: usize) -> Option<u32> {
        if position >= self.transactions.len() {
            return None;
        }
        let preceding: usize = self.transactions[..position]
            .iter()
            .map(Transaction::serialized_size)
            .sum();
        let offset = BlockHeader::SERIALIZED_SIZE as usize
            + compact_size_len(self.transactions.len() as u64)
            + preceding;
        u32::try_from(offset).ok()
    }

    /// Header followed by the compact-size counted transactions
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.header.serialize();
        write_compact_size(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.serialize());
        }
        buf
    }
}

/// Bitcoin-style merkle root: pairwise double-SHA256, duplicating the last
/// node on odd levels
pub fn compute_merkle_root(transactions: &[Transaction]) -> Hash256 {
    let mut level: Vec<Hash256> = transactions.iter().map(Transaction::txid).collect();
    if level.is_empty() {
        return ZERO_HASH;
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut concat = [0u8; 64];
                concat[..32].copy_from_slice(&left);
                concat[32..].copy_from_slice(&right);
                sha256d(&concat)
            })
            .collect();
    }

    level[0]
}
