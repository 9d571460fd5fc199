//! Commitment primitives for the anonymous-mint ledger.
//!
//! Coins are Pedersen commitments over the Jubjub prime-order subgroup. The
//! proof attached to a mint output is a two-generator Schnorr proof of
//! knowledge of the committed (serial, randomness) pair; everything past
//! that (one-out-of-many spend proofs) lives outside this workspace.

use std::sync::OnceLock;

use group::cofactor::CofactorGroup;
use group::Group;
use jubjub::{AffinePoint, ExtendedPoint};

use anonmint_primitives::sha256;

pub mod coin;
pub mod proof;
pub mod script;

pub use coin::{GroupElement, PrivateCoin, PublicCoin, Scalar};
pub use proof::{MintProof, MINT_PROOF_SIZE};

pub struct Generators {
    /// Commits the serial.
    pub g: GroupElement,
    /// Commits the randomness.
    pub h: GroupElement,
}

static GENERATORS: OnceLock<Generators> = OnceLock::new();

pub fn generators() -> &'static Generators {
    GENERATORS.get_or_init(|| Generators {
        g: GroupElement::generator(),
        h: derive_generator(b"anonmint.generator.h"),
    })
}

/// Derives an independent generator by rejection-sampled hash-to-point, so
/// no party knows its discrete log relative to the base generator.
fn derive_generator(tag: &[u8]) -> GroupElement {
    let mut data = Vec::with_capacity(tag.len() + 4);
    for counter in 0u32..=u32::MAX {
        data.clear();
        data.extend_from_slice(tag);
        data.extend_from_slice(&counter.to_le_bytes());
        let candidate = sha256(&data);
        if let Some(point) = Option::<AffinePoint>::from(AffinePoint::from_bytes(candidate)) {
            let point = ExtendedPoint::from(point).clear_cofactor();
            if !bool::from(point.is_identity()) {
                return point;
            }
        }
    }
    unreachable!("hash-to-point exhausted the counter space")
}
