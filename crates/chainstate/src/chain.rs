//! Chain collaborator interface consumed by the coin tracker.
//!
//! The surrounding node owns blocks and the chain index; the tracker only
//! needs per-block mint/serial summaries for (re)building its state and raw
//! outputs for resolving a commitment back to its outpoint.

use anonmint_primitives::{Hash256, OutPoint, TxOut};
use anonmint_sigma::script::{is_mint_script, parse_mint_commitment};
use anonmint_sigma::{PublicCoin, Scalar};

/// Per-block summary produced by block validation: the commitments minted
/// and the (serial, group id) pairs revealed by spends.
#[derive(Clone, Debug, Default)]
pub struct MintTxInfo {
    pub mints: Vec<PublicCoin>,
    pub spent_serials: Vec<(Scalar, u32)>,
}

/// A transaction reduced to what outpoint recovery needs.
#[derive(Clone, Debug)]
pub struct BlockTransaction {
    pub txid: Hash256,
    pub outputs: Vec<TxOut>,
}

pub trait ChainIndex {
    /// First height at which mints can appear (protocol activation).
    fn start_height(&self) -> i32;

    /// Height of the current tip, `None` for an empty chain.
    fn tip_height(&self) -> Option<i32>;

    fn mint_info(&self, height: i32) -> Option<MintTxInfo>;

    fn transactions(&self, height: i32) -> Option<Vec<BlockTransaction>>;
}

/// Scans a block's outputs for the mint script committing to `coin`.
pub fn out_point_from_transactions(
    transactions: &[BlockTransaction],
    coin: &PublicCoin,
) -> Option<OutPoint> {
    for tx in transactions {
        for (n, output) in tx.outputs.iter().enumerate() {
            if !is_mint_script(&output.script_pubkey) {
                continue;
            }
            match parse_mint_commitment(&output.script_pubkey) {
                Ok(parsed) if parsed == *coin => {
                    return Some(OutPoint::new(tx.txid, n as u32));
                }
                _ => {}
            }
        }
    }
    None
}

/// Simple vector-backed chain index for tests and tools.
#[derive(Default)]
pub struct MemoryChain {
    start_height: i32,
    blocks: Vec<(MintTxInfo, Vec<BlockTransaction>)>,
}

impl MemoryChain {
    pub fn new(start_height: i32) -> Self {
        Self {
            start_height,
            blocks: Vec::new(),
        }
    }

    /// Appends a block and returns its height.
    pub fn push_block(&mut self, info: MintTxInfo, transactions: Vec<BlockTransaction>) -> i32 {
        self.blocks.push((info, transactions));
        self.start_height + self.blocks.len() as i32 - 1
    }

    /// Drops the tip block.
    pub fn pop_block(&mut self) {
        self.blocks.pop();
    }

    fn slot(&self, height: i32) -> Option<usize> {
        if height < self.start_height {
            return None;
        }
        let slot = (height - self.start_height) as usize;
        (slot < self.blocks.len()).then_some(slot)
    }
}

impl ChainIndex for MemoryChain {
    fn start_height(&self) -> i32 {
        self.start_height
    }

    fn tip_height(&self) -> Option<i32> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(self.start_height + self.blocks.len() as i32 - 1)
        }
    }

    fn mint_info(&self, height: i32) -> Option<MintTxInfo> {
        self.slot(height).map(|slot| self.blocks[slot].0.clone())
    }

    fn transactions(&self, height: i32) -> Option<Vec<BlockTransaction>> {
        self.slot(height).map(|slot| self.blocks[slot].1.clone())
    }
}
