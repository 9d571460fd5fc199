//! Consensus state for the anonymous-mint ledger: the persistent mint
//! group database and the in-memory chain-state coin tracker.

use anonmint_primitives::encoding::DecodeError;
use anonmint_storage::StoreError;

pub mod chain;
pub mod mintdb;
pub mod tracker;

pub use chain::{out_point_from_transactions, BlockTransaction, ChainIndex, MemoryChain, MintTxInfo};
pub use mintdb::{
    MintAdded, MintGroupDb, MintObserver, MintRemoved, SubscriptionId, MAX_GROUP_SIZE,
};
pub use tracker::{CoinGroupInfo, CoinTracker, DEFAULT_COIN_GROUP_CAPACITY};

#[derive(Debug)]
pub enum LedgerError {
    /// A point lookup found nothing.
    NotFound(&'static str),
    /// The caller broke an operation's contract; nothing was mutated.
    InvalidArgument(&'static str),
    /// A block carried state the chain already has (double spend or
    /// duplicate commitment); the whole block was rejected.
    ConsensusViolation(&'static str),
    /// A persisted record failed to decode.
    Corrupt(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::NotFound(message) => write!(f, "{message}"),
            LedgerError::InvalidArgument(message) => write!(f, "{message}"),
            LedgerError::ConsensusViolation(message) => write!(f, "{message}"),
            LedgerError::Corrupt(message) => write!(f, "{message}"),
            LedgerError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Store(err)
    }
}

impl From<DecodeError> for LedgerError {
    fn from(_: DecodeError) -> Self {
        LedgerError::Corrupt("invalid ledger record encoding")
    }
}
