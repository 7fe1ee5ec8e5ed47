//! Block, transaction and unit types consumed by the kernel engine

pub mod block;
pub mod encode;
pub mod transaction;
pub mod units;

pub use block::{compute_merkle_root, Block, BlockHeader};
pub use transaction::{OutPoint, Transaction, TxIn, TxOut};
pub use units::{Amount, CENT, COIN, SECONDS_PER_DAY};
