//! Kernel Hash Vectors
//!
//! Fixed-input kernels with hashes computed independently of this crate.
//! A stake of 1000 coins created at T0 is evaluated one day later under
//! coin-day weighting, against two adjacent compact targets that sit on
//! either side of the kernel hash.

mod common;

use primitive_types::U512;
use stakeguard_core::consensus::{evaluate_kernel, kernel_hash, kernel_weight, weighted_target};
use stakeguard_core::hash::{hash_to_hex, hash_to_u256};
use stakeguard_core::{
    Amount, BlockHeader, ConsensusParams, KernelCandidate, KernelError, OutPoint, ZERO_HASH,
};

const T0: u32 = 1_600_000_000;
const MODIFIER: u64 = 0x0123_4567_89ab_cdef;

/// Kernel hash of the vector, most significant byte first
const KERNEL_HASH_HEX: &str = "6c5cba4f8f3aaafd53eb32bda55348a3e7fef8c5e6e8afebe9863cb04647d353";

/// Smallest compact target the vector meets, and the one just below it
const ACCEPT_BITS: u32 = 0x1f1c_f4f9;
const REJECT_BITS: u32 = 0x1f1c_f4f8;

/// Coin-day weighted rules (V03 active, V09 not yet)
fn coin_day_params() -> ConsensusParams {
    let mut params = common::regtest();
    params.activation.v09 = u32::MAX;
    params
}

fn txid() -> [u8; 32] {
    let mut txid = [0u8; 32];
    for (i, byte) in txid.iter_mut().enumerate() {
        *byte = i as u8;
    }
    txid
}

fn candidate(block_from: &BlockHeader, bits: u32) -> KernelCandidate<'_> {
    KernelCandidate {
        block_from,
        stake_modifier: MODIFIER,
        target_bits: bits,
        prev_tx_time: T0,
        prev_amount: Amount::from_coins(1_000),
        prevout: OutPoint::new(txid(), 1),
        candidate_time: T0 + 86_400,
        tx_prev_offset: 81,
    }
}

#[test]
fn test_vector_hash_and_weight() {
    let params = coin_day_params();
    let from = BlockHeader::new(1, ZERO_HASH, ZERO_HASH, T0, 0x1d00ffff, 0);
    let c = candidate(&from, ACCEPT_BITS);

    assert_eq!(hash_to_hex(&kernel_hash(&params, &c)), KERNEL_HASH_HEX);

    // (86400 - 3600 min age) seconds of 1000 coins is 958 coin-days
    assert_eq!(kernel_weight(&params, c.prev_amount, T0, T0 + 86_400), 958);
}

#[test]
fn test_vector_accepts_at_boundary() {
    let params = coin_day_params();
    let from = BlockHeader::new(1, ZERO_HASH, ZERO_HASH, T0, 0x1d00ffff, 0);

    let proof = evaluate_kernel(&params, &candidate(&from, ACCEPT_BITS)).unwrap();
    assert_eq!(hash_to_hex(&proof.hash), KERNEL_HASH_HEX);
    assert_eq!(proof.weight, 958);
    assert_eq!(proof.stake_modifier, MODIFIER);

    let hash = U512::from(hash_to_u256(&proof.hash));
    assert!(hash <= weighted_target(ACCEPT_BITS, 958));
    assert!(hash > weighted_target(REJECT_BITS, 958));
}

#[test]
fn test_vector_rejects_just_below() {
    let params = coin_day_params();
    let from = BlockHeader::new(1, ZERO_HASH, ZERO_HASH, T0, 0x1d00ffff, 0);

    match evaluate_kernel(&params, &candidate(&from, REJECT_BITS)) {
        Err(KernelError::KernelAboveTarget { hash, weight }) => {
            assert_eq!(hash_to_hex(&hash), KERNEL_HASH_HEX);
            assert_eq!(weight, 958);
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    println!("✓ Kernel accepted at {ACCEPT_BITS:#010x}, rejected at {REJECT_BITS:#010x}");
}

#[test]
fn test_easy_and_hard_targets() {
    let params = coin_day_params();
    let from = BlockHeader::new(1, ZERO_HASH, ZERO_HASH, T0, 0x1d00ffff, 0);

    assert!(evaluate_kernel(&params, &candidate(&from, common::EASY_BITS)).is_ok());
    assert!(matches!(
        evaluate_kernel(&params, &candidate(&from, 0x0300_0001)),
        Err(KernelError::KernelAboveTarget { .. })
    ));
}

#[test]
fn test_amount_weighting_after_v09() {
    // Same inputs, but weighted by raw amount: the vector target now passes
    // with a huge margin
    let params = common::regtest();
    let from = BlockHeader::new(1, ZERO_HASH, ZERO_HASH, T0, 0x1d00ffff, 0);
    let proof = evaluate_kernel(&params, &candidate(&from, REJECT_BITS)).unwrap();
    assert_eq!(proof.weight, Amount::from_coins(1_000).as_units());
}
