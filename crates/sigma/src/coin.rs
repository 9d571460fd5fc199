use std::hash::{Hash, Hasher};

use group::ff::Field;
use group::GroupEncoding;
use rand_core::RngCore;

use anonmint_primitives::{sha256, Hash256};

use crate::generators;

pub type Scalar = jubjub::Scalar;
pub type GroupElement = jubjub::SubgroupPoint;

/// A published coin commitment. Opaque to the ledger: it is compared,
/// hashed and serialized but never opened.
#[derive(Clone, Copy, Debug)]
pub struct PublicCoin {
    value: GroupElement,
}

impl PublicCoin {
    pub fn new(value: GroupElement) -> Self {
        Self { value }
    }

    pub fn value(&self) -> GroupElement {
        self.value
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.value.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        Option::<GroupElement>::from(GroupElement::from_bytes(bytes)).map(Self::new)
    }

    /// SHA-256 of the canonical encoding; the lookup key for
    /// hash-addressed outpoint queries.
    pub fn hash(&self) -> Hash256 {
        sha256(&self.to_bytes())
    }
}

impl PartialEq for PublicCoin {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for PublicCoin {}

impl Hash for PublicCoin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

/// The minter's secret: the serial revealed on spend and the commitment
/// randomness.
#[derive(Clone, Copy, Debug)]
pub struct PrivateCoin {
    serial: Scalar,
    randomness: Scalar,
}

impl PrivateCoin {
    pub fn new(serial: Scalar, randomness: Scalar) -> Self {
        Self { serial, randomness }
    }

    pub fn random(rng: &mut impl RngCore) -> Self {
        Self {
            serial: Scalar::random(&mut *rng),
            randomness: Scalar::random(&mut *rng),
        }
    }

    pub fn serial(&self) -> Scalar {
        self.serial
    }

    pub fn randomness(&self) -> Scalar {
        self.randomness
    }

    /// `C = g * serial + h * randomness`.
    pub fn public_coin(&self) -> PublicCoin {
        let gens = generators();
        PublicCoin::new(gens.g * self.serial + gens.h * self.randomness)
    }
}

/// Canonical 32-byte encoding of a spend serial.
pub fn serial_to_bytes(serial: &Scalar) -> [u8; 32] {
    serial.to_bytes()
}

pub fn serial_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::<Scalar>::from(Scalar::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn commitment_is_deterministic_in_secrets() {
        let coin = PrivateCoin::random(&mut OsRng);
        let again = PrivateCoin::new(coin.serial(), coin.randomness());
        assert_eq!(coin.public_coin(), again.public_coin());
    }

    #[test]
    fn distinct_secrets_give_distinct_commitments() {
        let a = PrivateCoin::random(&mut OsRng);
        let b = PrivateCoin::random(&mut OsRng);
        assert_ne!(a.public_coin(), b.public_coin());
    }

    #[test]
    fn public_coin_encoding_roundtrip() {
        let coin = PrivateCoin::random(&mut OsRng).public_coin();
        let bytes = coin.to_bytes();
        assert_eq!(PublicCoin::from_bytes(&bytes), Some(coin));
    }

    #[test]
    fn serial_encoding_roundtrip() {
        let serial = Scalar::random(&mut OsRng);
        let bytes = serial_to_bytes(&serial);
        assert_eq!(serial_from_bytes(&bytes), Some(serial));
    }
}
