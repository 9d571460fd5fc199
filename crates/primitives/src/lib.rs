//! Shared ledger primitives and consensus serialization.

pub mod encoding;
pub mod hash;
pub mod outpoint;

pub use hash::{sha256, sha256d};
pub use outpoint::OutPoint;

pub type Hash256 = [u8; 32];

/// Identifier of the managed asset a mint belongs to.
pub type PropertyId = u32;

/// Denomination slot within a property.
pub type DenominationId = u32;

/// Anonymity-group identifier within a (property, denomination) pair.
pub type MintGroupId = u32;

/// Position of a mint inside its group; bounded by the configured group size.
pub type MintGroupIndex = u16;

/// A transaction output as seen by the mint ledger: the value and the raw
/// output script it scans for mint commitments.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
}
