//! Persistent, grouped, sequence-ordered store of mint commitments.
//!
//! Mints land in fixed-capacity anonymity groups per (property,
//! denomination); a global sequence number totally orders live records so a
//! reorg can delete everything minted at or above a block in one batch.

use std::collections::BTreeMap;

use anonmint_primitives::encoding::{Decoder, Encoder};
use anonmint_primitives::{DenominationId, MintGroupId, MintGroupIndex, PropertyId};
use anonmint_sigma::PublicCoin;
use anonmint_storage::{Column, KeyValueStore, WriteBatch};

use crate::LedgerError;

/// Upper bound on group capacity; bounded by the anonymity-set size a spend
/// proof can cover.
pub const MAX_GROUP_SIZE: u16 = 16384;

const GROUP_SIZE_KEY: &[u8] = b"groupsize";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MintAdded {
    pub property: PropertyId,
    pub denomination: DenominationId,
    pub group: MintGroupId,
    pub index: MintGroupIndex,
    pub pub_key: PublicCoin,
    pub block: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MintRemoved {
    pub property: PropertyId,
    pub denomination: DenominationId,
    pub pub_key: PublicCoin,
}

/// Synchronous subscriber to mint lifecycle events. Called on the mutating
/// call stack; must not re-enter the database.
pub trait MintObserver {
    fn mint_added(&mut self, event: &MintAdded);
    fn mint_removed(&mut self, event: &MintRemoved);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

pub struct MintGroupDb<S> {
    store: S,
    group_size: u16,
    next_sequence: u64,
    observers: Vec<(SubscriptionId, Box<dyn MintObserver>)>,
    next_subscription: u64,
}

impl<S: KeyValueStore> MintGroupDb<S> {
    /// Opens the database, persisting `group_size` on a fresh store and
    /// validating it against the persisted value otherwise. Zero means
    /// "use the default".
    pub fn new(store: S, group_size: u16) -> Result<Self, LedgerError> {
        let group_size = init_group_size(&store, group_size)?;
        let next_sequence = load_next_sequence(&store)?;
        Ok(Self {
            store,
            group_size,
            next_sequence,
            observers: Vec::new(),
            next_subscription: 0,
        })
    }

    pub fn group_size(&self) -> u16 {
        self.group_size
    }

    /// The sequence number the next insert will consume.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn subscribe(&mut self, observer: Box<dyn MintObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Box<dyn MintObserver>> {
        let position = self
            .observers
            .iter()
            .position(|(candidate, _)| *candidate == id)?;
        Some(self.observers.remove(position).1)
    }

    /// Records a mint, assigning the next free (group, index) slot for the
    /// pair and rolling over to a fresh group at capacity.
    pub fn record_mint(
        &mut self,
        property: PropertyId,
        denomination: DenominationId,
        pub_key: PublicCoin,
        block: i32,
    ) -> Result<(MintGroupId, MintGroupIndex), LedgerError> {
        let (mut group, mut count) = self.last_group_entry(property, denomination)?;
        if count >= self.group_size {
            group += 1;
            count = 0;
            anonmint_log::log_debug!(
                "opening mint group {group} for property {property} denomination {denomination}"
            );
        }
        let index = count as MintGroupIndex;
        let sequence = self.next_sequence;

        let mut batch = WriteBatch::new();
        batch.put(
            Column::MintRecord,
            mint_key(property, denomination, group, index),
            encode_record(&pub_key, block),
        );
        batch.put(
            Column::MintSequence,
            sequence_key(sequence),
            encode_back_reference(property, denomination, group, index),
        );
        batch.put(
            Column::LastGroup,
            last_group_key(property, denomination),
            encode_last_group(group, count + 1),
        );
        self.store.write_batch(&batch)?;
        self.next_sequence = sequence + 1;

        let event = MintAdded {
            property,
            denomination,
            group,
            index,
            pub_key,
            block,
        };
        for (_, observer) in &mut self.observers {
            observer.mint_added(&event);
        }
        Ok((group, index))
    }

    pub fn mint(
        &self,
        property: PropertyId,
        denomination: DenominationId,
        group: MintGroupId,
        index: MintGroupIndex,
    ) -> Result<(PublicCoin, i32), LedgerError> {
        let key = mint_key(property, denomination, group, index);
        match self.store.get(Column::MintRecord, &key)? {
            Some(bytes) => decode_record(&bytes),
            None => Err(LedgerError::NotFound("not found sigma mint")),
        }
    }

    /// Number of live records in the group; zero when the group was never
    /// populated.
    pub fn mint_count(
        &self,
        property: PropertyId,
        denomination: DenominationId,
        group: MintGroupId,
    ) -> Result<u64, LedgerError> {
        let prefix = group_prefix(property, denomination, group);
        let mut count = 0u64;
        self.store
            .for_each_prefix(Column::MintRecord, &prefix, &mut |_, _| {
                count += 1;
                Ok(())
            })?;
        Ok(count)
    }

    /// Most recently opened (possibly not yet full) group for the pair;
    /// zero when nothing was recorded yet.
    pub fn last_group_id(
        &self,
        property: PropertyId,
        denomination: DenominationId,
    ) -> Result<MintGroupId, LedgerError> {
        Ok(self.last_group_entry(property, denomination)?.0)
    }

    /// Up to `count` commitments from the group in ascending index order.
    /// Unknown groups yield an empty set, never an error.
    pub fn anonymity_group(
        &self,
        property: PropertyId,
        denomination: DenominationId,
        group: MintGroupId,
        count: usize,
    ) -> Result<Vec<PublicCoin>, LedgerError> {
        let prefix = group_prefix(property, denomination, group);
        let entries = self.store.scan_prefix(Column::MintRecord, &prefix)?;
        let mut coins = Vec::with_capacity(count.min(entries.len()));
        for (_, value) in entries.into_iter().take(count) {
            let (coin, _) = decode_record(&value)?;
            coins.push(coin);
        }
        Ok(coins)
    }

    /// Atomically deletes every record minted at or above `block`, newest
    /// sequence first, unwinding group counters as it goes. A group that
    /// drains while an earlier group exists retracts the last-group cursor
    /// one step, so a deep rollback cascades across every emptied group.
    pub fn delete_from_block(&mut self, block: i32) -> Result<(), LedgerError> {
        let sequences = self.store.scan_prefix(Column::MintSequence, &[])?;
        let mut batch = WriteBatch::new();
        let mut cursors: BTreeMap<(PropertyId, DenominationId), (MintGroupId, u16)> =
            BTreeMap::new();
        let mut removed_events = Vec::new();

        for (sequence_key, back_reference) in sequences.iter().rev() {
            let (property, denomination, group, index) = decode_back_reference(back_reference)?;
            let record_key = mint_key(property, denomination, group, index);
            let record = self
                .store
                .get(Column::MintRecord, &record_key)?
                .ok_or(LedgerError::Corrupt("dangling mint sequence entry"))?;
            let (pub_key, record_block) = decode_record(&record)?;
            if record_block < block {
                continue;
            }

            batch.delete(Column::MintRecord, record_key);
            batch.delete(Column::MintSequence, sequence_key.as_slice());

            let (mut last_group, mut count) = match cursors.get(&(property, denomination)) {
                Some(entry) => *entry,
                None => self.last_group_entry(property, denomination)?,
            };
            if group == last_group && count > 0 {
                count -= 1;
                if count == 0 && last_group > 0 {
                    last_group -= 1;
                    // Earlier groups are untouched so far: deletion runs
                    // newest-first within the pair.
                    count = self.mint_count(property, denomination, last_group)? as u16;
                }
            }
            cursors.insert((property, denomination), (last_group, count));

            removed_events.push(MintRemoved {
                property,
                denomination,
                pub_key,
            });
        }

        if removed_events.is_empty() {
            return Ok(());
        }

        for ((property, denomination), (group, count)) in &cursors {
            batch.put(
                Column::LastGroup,
                last_group_key(*property, *denomination),
                encode_last_group(*group, *count),
            );
        }
        self.store.write_batch(&batch)?;
        self.next_sequence = load_next_sequence(&self.store)?;
        anonmint_log::log_debug!(
            "deleted {} mint records at or above block {block}",
            removed_events.len()
        );

        for event in &removed_events {
            for (_, observer) in &mut self.observers {
                observer.mint_removed(event);
            }
        }
        Ok(())
    }

    fn last_group_entry(
        &self,
        property: PropertyId,
        denomination: DenominationId,
    ) -> Result<(MintGroupId, u16), LedgerError> {
        let key = last_group_key(property, denomination);
        match self.store.get(Column::LastGroup, &key)? {
            Some(bytes) => decode_last_group(&bytes),
            None => Ok((0, 0)),
        }
    }
}

fn init_group_size<S: KeyValueStore>(store: &S, requested: u16) -> Result<u16, LedgerError> {
    if requested > MAX_GROUP_SIZE {
        return Err(LedgerError::InvalidArgument("group size exceed limit"));
    }
    match store.get(Column::Meta, GROUP_SIZE_KEY)? {
        Some(bytes) => {
            let persisted = decode_group_size(&bytes)?;
            if requested != 0 && requested != persisted {
                return Err(LedgerError::InvalidArgument(
                    "group size input isn't equal to group size in database",
                ));
            }
            Ok(persisted)
        }
        None => {
            let effective = if requested == 0 {
                MAX_GROUP_SIZE
            } else {
                requested
            };
            store.put(Column::Meta, GROUP_SIZE_KEY, &effective.to_le_bytes())?;
            Ok(effective)
        }
    }
}

fn load_next_sequence<S: KeyValueStore>(store: &S) -> Result<u64, LedgerError> {
    let entries = store.scan_prefix(Column::MintSequence, &[])?;
    let Some((key, _)) = entries.last() else {
        return Ok(0);
    };
    let last: [u8; 8] = key
        .as_slice()
        .try_into()
        .map_err(|_| LedgerError::Corrupt("invalid mint sequence key"))?;
    Ok(u64::from_be_bytes(last) + 1)
}

// Keys are fixed-width big-endian so prefix iteration yields ascending
// (group, index) and ascending sequence order.

fn mint_key(
    property: PropertyId,
    denomination: DenominationId,
    group: MintGroupId,
    index: MintGroupIndex,
) -> [u8; 14] {
    let mut key = [0u8; 14];
    key[0..4].copy_from_slice(&property.to_be_bytes());
    key[4..8].copy_from_slice(&denomination.to_be_bytes());
    key[8..12].copy_from_slice(&group.to_be_bytes());
    key[12..14].copy_from_slice(&index.to_be_bytes());
    key
}

fn group_prefix(
    property: PropertyId,
    denomination: DenominationId,
    group: MintGroupId,
) -> [u8; 12] {
    let mut prefix = [0u8; 12];
    prefix[0..4].copy_from_slice(&property.to_be_bytes());
    prefix[4..8].copy_from_slice(&denomination.to_be_bytes());
    prefix[8..12].copy_from_slice(&group.to_be_bytes());
    prefix
}

fn last_group_key(property: PropertyId, denomination: DenominationId) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[0..4].copy_from_slice(&property.to_be_bytes());
    key[4..8].copy_from_slice(&denomination.to_be_bytes());
    key
}

fn sequence_key(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}

fn encode_record(pub_key: &PublicCoin, block: i32) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_bytes(&pub_key.to_bytes());
    encoder.write_i32_le(block);
    encoder.into_inner()
}

fn decode_record(bytes: &[u8]) -> Result<(PublicCoin, i32), LedgerError> {
    let mut decoder = Decoder::new(bytes);
    let coin_bytes = decoder.read_fixed::<32>()?;
    let block = decoder.read_i32_le()?;
    if !decoder.is_empty() {
        return Err(LedgerError::Corrupt("trailing bytes in mint record"));
    }
    let pub_key = PublicCoin::from_bytes(&coin_bytes)
        .ok_or(LedgerError::Corrupt("invalid commitment in mint record"))?;
    Ok((pub_key, block))
}

fn encode_back_reference(
    property: PropertyId,
    denomination: DenominationId,
    group: MintGroupId,
    index: MintGroupIndex,
) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_u32_le(property);
    encoder.write_u32_le(denomination);
    encoder.write_u32_le(group);
    encoder.write_u16_le(index);
    encoder.into_inner()
}

fn decode_back_reference(
    bytes: &[u8],
) -> Result<(PropertyId, DenominationId, MintGroupId, MintGroupIndex), LedgerError> {
    let mut decoder = Decoder::new(bytes);
    let property = decoder.read_u32_le()?;
    let denomination = decoder.read_u32_le()?;
    let group = decoder.read_u32_le()?;
    let index = decoder.read_u16_le()?;
    if !decoder.is_empty() {
        return Err(LedgerError::Corrupt("trailing bytes in sequence entry"));
    }
    Ok((property, denomination, group, index))
}

fn encode_last_group(group: MintGroupId, count: u16) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_u32_le(group);
    encoder.write_u16_le(count);
    encoder.into_inner()
}

fn decode_last_group(bytes: &[u8]) -> Result<(MintGroupId, u16), LedgerError> {
    let mut decoder = Decoder::new(bytes);
    let group = decoder.read_u32_le()?;
    let count = decoder.read_u16_le()?;
    if !decoder.is_empty() {
        return Err(LedgerError::Corrupt("trailing bytes in last group entry"));
    }
    Ok((group, count))
}

fn decode_group_size(bytes: &[u8]) -> Result<u16, LedgerError> {
    let size: [u8; 2] = bytes
        .try_into()
        .map_err(|_| LedgerError::Corrupt("invalid group size record"))?;
    Ok(u16::from_le_bytes(size))
}
