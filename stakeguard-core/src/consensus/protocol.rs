//! Protocol epoch gate
//!
//! Each rule set switches on at a fixed wall-clock time and never switches
//! off. Everything before the first switch runs the legacy rules. V06 is
//! the odd one out: it is decided from the predecessor entry, whose time is
//! final, and additionally needs a version super-majority.

use crate::config::ConsensusParams;
use crate::storage::{AncestorWalk, BlockId, ChainView};
use std::fmt;

/// Whether a given coinstake is subject to the v0.3 protocol
pub fn is_protocol_v03(params: &ConsensusParams, time_coinstake: u32) -> bool {
    time_coinstake >= params.activation.v03
}

/// Whether a given block is subject to the v0.4 protocol
pub fn is_protocol_v04(params: &ConsensusParams, time_block: u32) -> bool {
    time_block >= params.activation.v04
}

/// Whether a given transaction is subject to the v0.5 protocol
pub fn is_protocol_v05(params: &ConsensusParams, time_tx: u32) -> bool {
    time_tx >= params.activation.v05
}

/// Whether the block after `prev` is subject to the v0.6 protocol.
///
/// Pass the predecessor, never the candidate. Genesis (no predecessor) is
/// never V06.
pub fn is_protocol_v06(
    params: &ConsensusParams,
    chain: &dyn ChainView,
    prev: Option<BlockId>,
) -> bool {
    let Some(entry) = prev.and_then(|id| chain.entry(id)) else {
        return false;
    };
    if entry.time < params.activation.v06 {
        return false;
    }

    let rule = &params.v06_majority;
    is_super_majority(chain, rule.min_version, Some(entry.id), rule.required, rule.window)
}

/// Whether a given transaction is subject to the v0.7 protocol
pub fn is_protocol_v07(params: &ConsensusParams, time_tx: u32) -> bool {
    time_tx >= params.activation.v07
}

/// Whether the BIPs adopted from bitcoin 0.16 apply
pub fn is_btc16_bips_enabled(params: &ConsensusParams, time_tx: u32) -> bool {
    time_tx >= params.activation.btc16
}

/// Whether a given timestamp is subject to the v0.9 protocol
pub fn is_protocol_v09(params: &ConsensusParams, time_tx: u32) -> bool {
    time_tx >= params.activation.v09
}

/// True when at least `required` of the `to_check` blocks ending at `start`
/// have a version of at least `min_version`
pub fn is_super_majority(
    chain: &dyn ChainView,
    min_version: i32,
    start: Option<BlockId>,
    required: u32,
    to_check: u32,
) -> bool {
    let mut found = 0u32;
    for entry in AncestorWalk::new(chain, start).take(to_check as usize) {
        if entry.version >= min_version {
            found += 1;
            if found >= required {
                return true;
            }
        }
    }
    found >= required
}

/// Timestamp-gated epochs in activation order (V06 is not timestamp-gated)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolEpoch {
    Legacy,
    V03,
    V04,
    V05,
    V07,
    Btc16,
    V09,
}

impl ProtocolEpoch {
    /// Latest epoch active at `time`
    pub fn at(params: &ConsensusParams, time: u32) -> Self {
        if is_protocol_v09(params, time) {
            ProtocolEpoch::V09
        } else if is_btc16_bips_enabled(params, time) {
            ProtocolEpoch::Btc16
        } else if is_protocol_v07(params, time) {
            ProtocolEpoch::V07
        } else if is_protocol_v05(params, time) {
            ProtocolEpoch::V05
        } else if is_protocol_v04(params, time) {
            ProtocolEpoch::V04
        } else if is_protocol_v03(params, time) {
            ProtocolEpoch::V03
        } else {
            ProtocolEpoch::Legacy
        }
    }
}

impl fmt::Display for ProtocolEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolEpoch::Legacy => "v0.2",
            ProtocolEpoch::V03 => "v0.3",
            ProtocolEpoch::V04 => "v0.4",
            ProtocolEpoch::V05 => "v0.5",
            ProtocolEpoch::V07 => "v0.7",
            ProtocolEpoch::Btc16 => "btc16",
            ProtocolEpoch::V09 => "v0.9",
        };
        f.write_str(name)
    }
}

/// Snapshot of every rule flag for one timestamp and predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolRules {
    pub v03: bool,
    pub v04: bool,
    pub v05: bool,
    pub v06: bool,
    pub v07: bool,
    pub btc16: bool,
    pub v09: bool,
}

impl ProtocolRules {
    pub fn at(
        params: &ConsensusParams,
        chain: &dyn ChainView,
        time: u32,
        prev: Option<BlockId>,
    ) -> Self {
        Self {
            v03: is_protocol_v03(params, time),
            v04: is_protocol_v04(params, time),
            v05: is_protocol_v05(params, time),
            v06: is_protocol_v06(params, chain, prev),
            v07: is_protocol_v07(params, time),
            btc16: is_btc16_bips_enabled(params, time),
            v09: is_protocol_v09(params, time),
        }
    }
}
