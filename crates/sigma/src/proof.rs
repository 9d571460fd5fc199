use group::GroupEncoding;
use rand_core::RngCore;
use sha2::{Digest, Sha512};

use anonmint_primitives::encoding::DecodeError;

use crate::coin::{GroupElement, PrivateCoin, PublicCoin, Scalar};
use crate::generators;

/// Serialized size: commitment point plus two response scalars.
pub const MINT_PROOF_SIZE: usize = 96;

const CHALLENGE_DOMAIN: &[u8] = b"anonmint.mint.schnorr";

/// Two-generator Schnorr proof that the prover knows the (serial,
/// randomness) opening of a mint commitment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintProof {
    u: GroupElement,
    s_serial: Scalar,
    s_randomness: Scalar,
}

impl MintProof {
    pub fn prove(coin: &PrivateCoin, rng: &mut impl RngCore) -> Self {
        use group::ff::Field;

        let gens = generators();
        let r_serial = Scalar::random(&mut *rng);
        let r_randomness = Scalar::random(&mut *rng);
        let u = gens.g * r_serial + gens.h * r_randomness;
        let c = challenge(&coin.public_coin(), &u);
        Self {
            u,
            s_serial: r_serial + c * coin.serial(),
            s_randomness: r_randomness + c * coin.randomness(),
        }
    }

    pub fn verify(&self, commitment: &PublicCoin) -> bool {
        let gens = generators();
        let c = challenge(commitment, &self.u);
        gens.g * self.s_serial + gens.h * self.s_randomness == self.u + commitment.value() * c
    }

    pub fn to_bytes(&self) -> [u8; MINT_PROOF_SIZE] {
        let mut out = [0u8; MINT_PROOF_SIZE];
        out[0..32].copy_from_slice(&self.u.to_bytes());
        out[32..64].copy_from_slice(&self.s_serial.to_bytes());
        out[64..96].copy_from_slice(&self.s_randomness.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != MINT_PROOF_SIZE {
            return Err(DecodeError::InvalidData("mint proof has wrong length"));
        }
        let mut point = [0u8; 32];
        point.copy_from_slice(&bytes[0..32]);
        let u = Option::<GroupElement>::from(GroupElement::from_bytes(&point))
            .ok_or(DecodeError::InvalidData("invalid proof commitment point"))?;
        let mut repr = [0u8; 32];
        repr.copy_from_slice(&bytes[32..64]);
        let s_serial = Option::<Scalar>::from(Scalar::from_bytes(&repr))
            .ok_or(DecodeError::InvalidData("invalid proof response scalar"))?;
        repr.copy_from_slice(&bytes[64..96]);
        let s_randomness = Option::<Scalar>::from(Scalar::from_bytes(&repr))
            .ok_or(DecodeError::InvalidData("invalid proof response scalar"))?;
        Ok(Self {
            u,
            s_serial,
            s_randomness,
        })
    }
}

fn challenge(commitment: &PublicCoin, u: &GroupElement) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(CHALLENGE_DOMAIN);
    hasher.update(commitment.to_bytes());
    hasher.update(u.to_bytes());
    let digest: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_wide(&digest)
}
