/// Proof-of-stake validation
///
/// Sequences the consensus rules for one coinstake and connects a block's
/// stake state into the index.
pub mod stake;

use crate::config::ConsensusParams;
use crate::storage::ChainView;
use crate::types::{Transaction, TxOut};

pub use stake::{
    check_proof_of_stake, connect_block_stake, StakeProof, StakeValidation, ValidationStage,
};

/// Transaction signature verification collaborator
pub trait SignatureVerifier {
    /// Whether input `input_index` of `tx` validly spends `prev_output`
    fn verify(&self, tx: &Transaction, input_index: usize, prev_output: &TxOut) -> bool;
}

/// Everything a validation borrows: network parameters, the chain it
/// validates against and the signature checker
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub params: &'a ConsensusParams,
    pub chain: &'a dyn ChainView,
    pub verifier: &'a dyn SignatureVerifier,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        params: &'a ConsensusParams,
        chain: &'a dyn ChainView,
        verifier: &'a dyn SignatureVerifier,
    ) -> Self {
        Self {
            params,
            chain,
            verifier,
        }
    }
}
