//! In-memory chain-state coin tracker.
//!
//! Records, per connected block, the coins minted and the serials revealed
//! by spends. Blocks connect forward and disconnect in strict tip-first
//! order; the whole structure can be rebuilt by replaying the chain index
//! and the replay is exact, not an approximation.

use std::collections::{BTreeMap, HashMap};

use anonmint_primitives::{Hash256, OutPoint};
use anonmint_sigma::coin::serial_to_bytes;
use anonmint_sigma::{PublicCoin, Scalar};

use crate::chain::{out_point_from_transactions, ChainIndex, MintTxInfo};
use crate::LedgerError;

/// Chain-wide coin group capacity. One group is the anonymity set a spend
/// proof ranges over, so the cap bounds proof size.
pub const DEFAULT_COIN_GROUP_CAPACITY: usize = 65_000;

/// Aggregate over one chain-wide coin group. Block references are heights
/// resolved through the chain index on demand; the tracker never holds
/// pointers into externally owned index entries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoinGroupInfo {
    pub first_block: i32,
    pub last_block: i32,
    pub n_coins: usize,
}

#[derive(Clone, Copy, Debug)]
struct CoinPosition {
    group: u32,
    height: i32,
}

/// Journal entry for one connected block, kept so disconnection is an
/// exact inverse.
struct ConnectedBlock {
    height: i32,
    coins: Vec<(u32, [u8; 32])>,
    serials: Vec<[u8; 32]>,
}

pub struct CoinTracker {
    group_capacity: usize,
    groups: BTreeMap<u32, CoinGroupInfo>,
    coins: HashMap<[u8; 32], CoinPosition>,
    used_serials: HashMap<[u8; 32], u32>,
    connected: Vec<ConnectedBlock>,
}

impl Default for CoinTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COIN_GROUP_CAPACITY)
    }
}

impl CoinTracker {
    pub fn new(group_capacity: usize) -> Self {
        Self {
            group_capacity,
            groups: BTreeMap::new(),
            coins: HashMap::new(),
            used_serials: HashMap::new(),
            connected: Vec::new(),
        }
    }

    /// Applies one block's mints and spends. Validation runs before any
    /// mutation: a double-spent serial or duplicate commitment rejects the
    /// whole block and leaves the tracker untouched.
    pub fn connect_block(&mut self, height: i32, info: &MintTxInfo) -> Result<(), LedgerError> {
        if let Some(top) = self.connected.last() {
            if height <= top.height {
                return Err(LedgerError::InvalidArgument(
                    "blocks must connect in ascending height order",
                ));
            }
        }

        let mut staged_serials = Vec::with_capacity(info.spent_serials.len());
        for (serial, _) in &info.spent_serials {
            let bytes = serial_to_bytes(serial);
            if self.used_serials.contains_key(&bytes) || staged_serials.contains(&bytes) {
                return Err(LedgerError::ConsensusViolation("coin serial already spent"));
            }
            staged_serials.push(bytes);
        }

        let mut staged_coins = Vec::with_capacity(info.mints.len());
        for mint in &info.mints {
            let bytes = mint.to_bytes();
            if self.coins.contains_key(&bytes) || staged_coins.contains(&bytes) {
                return Err(LedgerError::ConsensusViolation(
                    "coin commitment already recorded",
                ));
            }
            staged_coins.push(bytes);
        }

        let mut entry = ConnectedBlock {
            height,
            coins: Vec::with_capacity(staged_coins.len()),
            serials: staged_serials,
        };

        for bytes in staged_coins {
            let group = self.group_for_next_coin(height);
            let group_info = self
                .groups
                .get_mut(&group)
                .ok_or(LedgerError::Corrupt("coin group vanished during connect"))?;
            group_info.last_block = height;
            group_info.n_coins += 1;
            self.coins.insert(bytes, CoinPosition { group, height });
            entry.coins.push((group, bytes));
        }

        for (bytes, (_, group_id)) in entry.serials.iter().zip(&info.spent_serials) {
            self.used_serials.insert(*bytes, *group_id);
        }

        self.connected.push(entry);
        Ok(())
    }

    /// Removes the tip block's mints and serials. Disconnecting a block
    /// that is not the most recently connected one is a contract violation;
    /// disconnecting from an empty tracker is a no-op.
    pub fn disconnect_block(&mut self, height: i32) -> Result<(), LedgerError> {
        let entry = match self.connected.pop() {
            Some(entry) if entry.height == height => entry,
            Some(entry) => {
                self.connected.push(entry);
                return Err(LedgerError::InvalidArgument(
                    "blocks must disconnect in tip-first order",
                ));
            }
            None => return Ok(()),
        };

        let mut touched_groups = Vec::new();
        for (group, bytes) in entry.coins.iter().rev() {
            self.coins.remove(bytes);
            let info = self
                .groups
                .get_mut(group)
                .ok_or(LedgerError::Corrupt("coin group missing on disconnect"))?;
            info.n_coins -= 1;
            if info.n_coins == 0 {
                self.groups.remove(group);
            } else if !touched_groups.contains(group) {
                touched_groups.push(*group);
            }
        }

        // A later removal from the same entry may have drained a group that
        // an earlier removal marked as touched.
        touched_groups.retain(|group| self.groups.contains_key(group));
        for group in touched_groups {
            let last_block = self
                .connected
                .iter()
                .rev()
                .find(|candidate| candidate.coins.iter().any(|(g, _)| *g == group))
                .map(|candidate| candidate.height)
                .ok_or(LedgerError::Corrupt("populated coin group has no blocks"))?;
            if let Some(info) = self.groups.get_mut(&group) {
                info.last_block = last_block;
            }
        }

        for bytes in &entry.serials {
            self.used_serials.remove(bytes);
        }
        Ok(())
    }

    /// Clears all state.
    pub fn reset(&mut self) {
        self.groups.clear();
        self.coins.clear();
        self.used_serials.clear();
        self.connected.clear();
    }

    /// Rebuilds by replaying the chain index from the activation height to
    /// the tip. Produces exactly the state the equivalent sequence of
    /// `connect_block` calls would have produced.
    pub fn build_from_index(&mut self, chain: &impl ChainIndex) -> Result<(), LedgerError> {
        self.reset();
        let Some(tip) = chain.tip_height() else {
            return Ok(());
        };
        for height in chain.start_height()..=tip {
            let info = chain.mint_info(height).unwrap_or_default();
            self.connect_block(height, &info)?;
        }
        anonmint_log::log_debug!(
            "rebuilt coin tracker: {} coins, {} spent serials, latest group {}",
            self.coins.len(),
            self.used_serials.len(),
            self.latest_coin_id()
        );
        Ok(())
    }

    pub fn has_coin(&self, coin: &PublicCoin) -> bool {
        self.coins.contains_key(&coin.to_bytes())
    }

    pub fn is_used_coin_serial(&self, serial: &Scalar) -> bool {
        self.used_serials.contains_key(&serial_to_bytes(serial))
    }

    /// Highest open group id; zero while no coins are tracked.
    pub fn latest_coin_id(&self) -> u32 {
        self.groups
            .last_key_value()
            .map(|(group, _)| *group)
            .unwrap_or(0)
    }

    pub fn coin_group_info(&self, group: u32) -> Option<CoinGroupInfo> {
        self.groups.get(&group).copied()
    }

    /// Height and group of a tracked commitment, as spend construction
    /// needs them.
    pub fn coin_height_and_group(&self, coin: &PublicCoin) -> Option<(i32, u32)> {
        self.coins
            .get(&coin.to_bytes())
            .map(|position| (position.height, position.group))
    }

    /// Resolves a tracked commitment to the output that minted it by
    /// scanning the owning block's outputs.
    pub fn out_point(
        &self,
        chain: &impl ChainIndex,
        coin: &PublicCoin,
    ) -> Result<Option<OutPoint>, LedgerError> {
        let Some(position) = self.coins.get(&coin.to_bytes()) else {
            return Ok(None);
        };
        let Some(transactions) = chain.transactions(position.height) else {
            return Ok(None);
        };
        Ok(out_point_from_transactions(&transactions, coin))
    }

    /// As `out_point`, addressed by the SHA-256 of the commitment encoding.
    pub fn out_point_by_hash(
        &self,
        chain: &impl ChainIndex,
        hash: &Hash256,
    ) -> Result<Option<OutPoint>, LedgerError> {
        for bytes in self.coins.keys() {
            let Some(coin) = PublicCoin::from_bytes(bytes) else {
                continue;
            };
            if coin.hash() == *hash {
                return self.out_point(chain, &coin);
            }
        }
        Ok(None)
    }

    /// Picks the group for the next coin, opening a fresh one when the
    /// current group is absent or full. Groups are numbered from 1.
    fn group_for_next_coin(&mut self, height: i32) -> u32 {
        let latest = self.latest_coin_id();
        if latest != 0 {
            if let Some(info) = self.groups.get(&latest) {
                if info.n_coins < self.group_capacity {
                    return latest;
                }
            }
        }
        let group = latest + 1;
        anonmint_log::log_debug!("opening coin group {group} at block {height}");
        self.groups.insert(
            group,
            CoinGroupInfo {
                first_block: height,
                last_block: height,
                n_coins: 0,
            },
        );
        group
    }
}
