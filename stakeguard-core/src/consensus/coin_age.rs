//! Coin age
//!
//! Legacy epochs weight a stake by how long its coins have been held.
//! Amounts are accumulated in cent-seconds and converted to coin-days at
//! the end; intermediates are 256-bit so no input combination can overflow.

use crate::config::ConsensusParams;
use crate::error::{KernelError, KernelResult};
use crate::hash::hash_to_hex;
use crate::storage::ChainView;
use crate::types::{Amount, Transaction, CENT, COIN, SECONDS_PER_DAY};
use primitive_types::U256;
use tracing::debug;

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.low_u64()
    }
}

/// Seconds of holding time an input earns between `begin` and `end`,
/// capped at the maximum age
pub fn coin_age_weight(params: &ConsensusParams, begin: u32, end: u32) -> u64 {
    let held = i64::from(end) - i64::from(begin);
    held.clamp(0, i64::from(params.stake_max_age)) as u64
}

/// Coin-days of `amount` held for `time_weight` seconds
pub fn coin_day_weight(amount: Amount, time_weight: u64) -> u64 {
    let weight = U256::from(amount.as_units()) * U256::from(time_weight)
        / U256::from(COIN)
        / U256::from(SECONDS_PER_DAY);
    saturating_u64(weight)
}

/// Total coin-days consumed by the inputs of `tx`.
///
/// Coinbase transactions have none. Every input must resolve and must not
/// be younger than the spending transaction. Inputs whose containing block
/// has not yet reached the minimum stake age contribute nothing; the rest
/// count every held second up to the maximum age.
pub fn coin_age(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    tx: &Transaction,
) -> KernelResult<u64> {
    if tx.is_coinbase() {
        return Ok(0);
    }

    let mut cent_seconds = U256::zero();
    for input in &tx.inputs {
        let prev = chain
            .resolve_prevout(&input.prevout)
            .ok_or_else(|| KernelError::missing_input(input.prevout))?;

        if tx.time < prev.tx.time {
            return Err(KernelError::InvalidTimestamp(format!(
                "transaction {} dated {} before its input {} dated {}",
                hash_to_hex(&tx.txid()),
                tx.time,
                input.prevout,
                prev.tx.time
            )));
        }

        if u64::from(prev.block_from.time) + u64::from(params.stake_min_age) > u64::from(tx.time) {
            debug!(
                "Input {} of {} below minimum stake age, skipped",
                input.prevout,
                hash_to_hex(&tx.txid())
            );
            continue;
        }

        let weight = coin_age_weight(params, prev.tx.time, tx.time);
        cent_seconds += U256::from(prev.output.value.as_units()) * U256::from(weight)
            / U256::from(CENT);
    }

    let coin_days = cent_seconds * U256::from(CENT) / U256::from(COIN) / U256::from(SECONDS_PER_DAY);
    let coin_days = saturating_u64(coin_days);
    debug!("Coin age of {}: {} coin-days", hash_to_hex(&tx.txid()), coin_days);
    Ok(coin_days)
}
