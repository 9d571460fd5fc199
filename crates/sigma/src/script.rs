//! Mint output scripts.
//!
//! A mint output carries an opcode, the 32-byte coin commitment and either
//! a Schnorr ownership proof (regular mint) or the encrypted value hint
//! (joinsplit change mint). Outpoint recovery scans block outputs for these
//! scripts.

use anonmint_primitives::encoding::DecodeError;

use crate::coin::PublicCoin;
use crate::proof::{MintProof, MINT_PROOF_SIZE};

pub const OP_SIGMA_MINT: u8 = 0xc3;
pub const OP_SIGMA_JMINT: u8 = 0xc4;

/// Size of the encrypted value hint carried by a jmint output.
pub const JMINT_ENCRYPTED_SIZE: usize = 16;

const COIN_SIZE: usize = 32;

pub fn is_mint_script(script: &[u8]) -> bool {
    script.len() > COIN_SIZE && matches!(script[0], OP_SIGMA_MINT | OP_SIGMA_JMINT)
}

pub fn build_mint_script(coin: &PublicCoin, proof: &MintProof) -> Vec<u8> {
    let mut script = Vec::with_capacity(1 + COIN_SIZE + MINT_PROOF_SIZE);
    script.push(OP_SIGMA_MINT);
    script.extend_from_slice(&coin.to_bytes());
    script.extend_from_slice(&proof.to_bytes());
    script
}

pub fn build_jmint_script(coin: &PublicCoin, encrypted_value: &[u8; JMINT_ENCRYPTED_SIZE]) -> Vec<u8> {
    let mut script = Vec::with_capacity(1 + COIN_SIZE + JMINT_ENCRYPTED_SIZE);
    script.push(OP_SIGMA_JMINT);
    script.extend_from_slice(&coin.to_bytes());
    script.extend_from_slice(encrypted_value);
    script
}

/// Extracts just the commitment, accepting either mint flavor.
pub fn parse_mint_commitment(script: &[u8]) -> Result<PublicCoin, DecodeError> {
    let (opcode, rest) = script
        .split_first()
        .ok_or(DecodeError::InvalidData("empty mint script"))?;
    if !matches!(*opcode, OP_SIGMA_MINT | OP_SIGMA_JMINT) {
        return Err(DecodeError::InvalidData("not a mint script"));
    }
    if rest.len() < COIN_SIZE {
        return Err(DecodeError::InvalidData("truncated mint script"));
    }
    let mut bytes = [0u8; COIN_SIZE];
    bytes.copy_from_slice(&rest[..COIN_SIZE]);
    PublicCoin::from_bytes(&bytes).ok_or(DecodeError::InvalidData("invalid coin commitment"))
}

pub fn parse_mint_script(script: &[u8]) -> Result<(PublicCoin, MintProof), DecodeError> {
    if script.first() != Some(&OP_SIGMA_MINT) {
        return Err(DecodeError::InvalidData("not a mint script"));
    }
    if script.len() != 1 + COIN_SIZE + MINT_PROOF_SIZE {
        return Err(DecodeError::InvalidData("truncated mint script"));
    }
    let coin = parse_mint_commitment(script)?;
    let proof = MintProof::from_bytes(&script[1 + COIN_SIZE..])?;
    Ok((coin, proof))
}

pub fn parse_jmint_script(script: &[u8]) -> Result<(PublicCoin, [u8; JMINT_ENCRYPTED_SIZE]), DecodeError> {
    if script.first() != Some(&OP_SIGMA_JMINT) {
        return Err(DecodeError::InvalidData("not a jmint script"));
    }
    if script.len() != 1 + COIN_SIZE + JMINT_ENCRYPTED_SIZE {
        return Err(DecodeError::InvalidData("truncated jmint script"));
    }
    let coin = parse_mint_commitment(script)?;
    let mut encrypted = [0u8; JMINT_ENCRYPTED_SIZE];
    encrypted.copy_from_slice(&script[1 + COIN_SIZE..]);
    Ok((coin, encrypted))
}
