//! Shared fixtures for the integration tests

#![allow(dead_code)]

use stakeguard_core::{
    connect_block_stake, Amount, Block, BlockId, ChainView, ConsensusParams, MemoryChainState,
    NetworkType, OutPoint, SignatureVerifier, Transaction, TxIn, TxOut, ValidationContext,
    ZERO_HASH,
};

pub const GENESIS_TIME: u32 = 1_200_000;
pub const BLOCK_SPACING: u32 = 60;
pub const EASY_BITS: u32 = 0x207f_ffff;
pub const COINBASE_VALUE: Amount = Amount::from_coins(50);

pub struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _tx: &Transaction, _input_index: usize, _prev_output: &TxOut) -> bool {
        true
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn regtest() -> ConsensusParams {
    ConsensusParams::for_network(NetworkType::Regtest)
}

pub fn coinbase(height: u32, time: u32) -> Transaction {
    Transaction::new(
        time,
        vec![TxIn::new(OutPoint::null(), height.to_le_bytes().to_vec())],
        vec![TxOut::new(COINBASE_VALUE, vec![0x51])],
    )
}

pub fn coinstake(prevout: OutPoint, time: u32) -> Transaction {
    Transaction::new(
        time,
        vec![TxIn::new(prevout, vec![0x00])],
        vec![TxOut::empty(), TxOut::new(COINBASE_VALUE, vec![0x51])],
    )
}

/// Chain under construction, connecting stake state as blocks arrive
pub struct ChainBuilder {
    pub params: ConsensusParams,
    pub chain: MemoryChainState,
    pub ids: Vec<BlockId>,
}

impl ChainBuilder {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            chain: MemoryChainState::new(),
            ids: Vec::new(),
        }
    }

    pub fn tip(&self) -> Option<BlockId> {
        self.ids.last().copied()
    }

    fn tip_hash(&self) -> [u8; 32] {
        self.tip()
            .and_then(|id| self.chain.entry(id))
            .map_or(ZERO_HASH, |e| e.hash)
    }

    fn next_height(&self) -> u32 {
        self.ids.len() as u32
    }

    fn connect(&mut self, block: Block) -> BlockId {
        let id = self.chain.add_block(block.clone()).unwrap();
        let ctx = ValidationContext::new(&self.params, &self.chain, &AcceptAll);
        connect_block_stake(&ctx, id, &block, None).unwrap();
        self.ids.push(id);
        id
    }

    /// Append a proof-of-work block `BLOCK_SPACING` after the tip
    pub fn push_pow(&mut self) -> BlockId {
        let height = self.next_height();
        let time = GENESIS_TIME + height * BLOCK_SPACING;
        let block = Block::new(1, self.tip_hash(), time, EASY_BITS, vec![coinbase(height, time)]);
        self.connect(block)
    }

    pub fn push_pow_blocks(&mut self, count: usize) {
        for _ in 0..count {
            self.push_pow();
        }
    }

    /// Append a proof-of-stake block staking the coinbase of `staked_height`
    pub fn push_pos(&mut self, staked_height: usize, time: u32) -> BlockId {
        let height = self.next_height();
        let mut coinbase = coinbase(height, time);
        coinbase.outputs = vec![TxOut::empty()];
        let stake = coinstake(self.coinbase_outpoint(staked_height), time);
        let block = Block::new(1, self.tip_hash(), time, EASY_BITS, vec![coinbase, stake]);
        self.connect(block)
    }

    pub fn coinbase_outpoint(&self, height: usize) -> OutPoint {
        let block = self.chain.block(self.ids[height]).unwrap();
        OutPoint::new(block.transactions[0].txid(), 0)
    }

    pub fn context(&self) -> ValidationContext<'_> {
        ValidationContext::new(&self.params, &self.chain, &AcceptAll)
    }
}
