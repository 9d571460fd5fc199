use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anonmint_chainstate::{
    LedgerError, MintAdded, MintGroupDb, MintObserver, MintRemoved, MAX_GROUP_SIZE,
};
use anonmint_sigma::{PrivateCoin, PublicCoin};
use anonmint_storage::memory::MemoryStore;
use rand_core::OsRng;

const TEST_GROUP_SIZE: u16 = 30;

#[derive(Clone, Default)]
struct Recorder {
    added: Rc<RefCell<Vec<MintAdded>>>,
    removed: Rc<RefCell<Vec<MintRemoved>>>,
}

impl MintObserver for Recorder {
    fn mint_added(&mut self, event: &MintAdded) {
        self.added.borrow_mut().push(*event);
    }

    fn mint_removed(&mut self, event: &MintRemoved) {
        self.removed.borrow_mut().push(*event);
    }
}

struct Fixture {
    db: MintGroupDb<Arc<MemoryStore>>,
    recorder: Recorder,
}

fn new_fixture() -> Fixture {
    new_fixture_with(Arc::new(MemoryStore::new()), TEST_GROUP_SIZE).expect("open db")
}

fn new_fixture_with(store: Arc<MemoryStore>, group_size: u16) -> Result<Fixture, LedgerError> {
    let mut db = MintGroupDb::new(store, group_size)?;
    let recorder = Recorder::default();
    db.subscribe(Box::new(recorder.clone()));
    Ok(Fixture { db, recorder })
}

fn new_coin() -> PublicCoin {
    PrivateCoin::random(&mut OsRng).public_coin()
}

fn new_coins(n: usize) -> Vec<PublicCoin> {
    (0..n).map(|_| new_coin()).collect()
}

#[test]
fn record_one_coin() {
    let mut fixture = new_fixture();
    let mint = new_coin();

    assert_eq!(fixture.db.mint_count(1, 0, 0).expect("count"), 0);
    assert_eq!(fixture.db.next_sequence(), 0);

    assert_eq!(
        fixture.db.record_mint(1, 0, mint, 100).expect("record"),
        (0, 0)
    );

    assert_eq!(fixture.db.last_group_id(1, 0).expect("last group"), 0);
    assert_eq!(fixture.db.mint_count(1, 0, 0).expect("count"), 1);
    assert_eq!(fixture.db.mint_count(1, 0, 1).expect("count"), 0);
    assert_eq!(fixture.db.next_sequence(), 1);

    let added = fixture.recorder.added.borrow();
    assert_eq!(added.len(), 1);
    assert_eq!(
        added[0],
        MintAdded {
            property: 1,
            denomination: 0,
            group: 0,
            index: 0,
            pub_key: mint,
            block: 100,
        }
    );
}

#[test]
fn mint_lookup_not_found() {
    let fixture = new_fixture();

    match fixture.db.mint(1, 1, 1, 1) {
        Err(LedgerError::NotFound(message)) => assert_eq!(message, "not found sigma mint"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn mint_lookup_roundtrip() {
    let mut fixture = new_fixture();
    let mint = new_coin();
    fixture.db.record_mint(1, 0, mint, 100).expect("record");

    assert_eq!(fixture.db.mint(1, 0, 0, 0).expect("lookup"), (mint, 100));
}

#[test]
fn anonymity_group_empty_without_coins() {
    let fixture = new_fixture();

    assert!(fixture.db.anonymity_group(0, 0, 0, 100).expect("get").is_empty());
}

#[test]
fn anonymity_group_empty_for_other_pair() {
    let mut fixture = new_fixture();
    for coin in new_coins(10) {
        fixture.db.record_mint(1, 1, coin, 10).expect("record");
    }

    assert!(fixture.db.anonymity_group(2, 2, 0, 11).expect("get").is_empty());
    assert!(fixture.db.anonymity_group(2, 2, 0, 1).expect("get").is_empty());
}

#[test]
fn anonymity_group_is_ordered_prefix() {
    let mut fixture = new_fixture();
    let coins = new_coins(10);
    for coin in &coins {
        fixture.db.record_mint(1, 1, *coin, 10).expect("record");
    }

    assert_eq!(fixture.db.anonymity_group(1, 1, 0, 11).expect("get"), coins);
    assert_eq!(fixture.db.anonymity_group(1, 1, 0, 10).expect("get"), coins);
    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 5).expect("get"),
        coins[..5]
    );
}

#[test]
fn anonymity_groups_isolated_per_property() {
    let mut fixture = new_fixture();
    let coins = new_coins(10);
    for coin in &coins {
        fixture.db.record_mint(1, 1, *coin, 10).expect("record");
    }
    let property2_coins = new_coins(10);
    for coin in &property2_coins {
        fixture.db.record_mint(2, 1, *coin, 10).expect("record");
    }

    assert_eq!(fixture.db.anonymity_group(1, 1, 0, 11).expect("get"), coins);
    assert_eq!(
        fixture.db.anonymity_group(2, 1, 0, 11).expect("get"),
        property2_coins
    );
    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 5).expect("get"),
        coins[..5]
    );
    assert_eq!(
        fixture.db.anonymity_group(2, 1, 0, 5).expect("get"),
        property2_coins[..5]
    );
}

#[test]
fn anonymity_groups_isolated_per_denomination() {
    let mut fixture = new_fixture();
    let coins = new_coins(10);
    let denom2_coins = new_coins(10);

    let mut block = 10;
    for i in 0..coins.len() {
        fixture.db.record_mint(1, 1, coins[i], block).expect("record");
        fixture.db.record_mint(1, 2, denom2_coins[i], 10).expect("record");
        block += 1;
    }

    assert_eq!(fixture.db.anonymity_group(1, 1, 0, 11).expect("get"), coins);
    assert_eq!(
        fixture.db.anonymity_group(1, 2, 0, 11).expect("get"),
        denom2_coins
    );
    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 5).expect("get"),
        coins[..5]
    );
}

#[test]
fn rollover_opens_new_group_at_capacity() {
    let mut fixture = new_fixture();
    let coins = new_coins(TEST_GROUP_SIZE as usize);
    for coin in &coins {
        fixture.db.record_mint(1, 1, *coin, 10).expect("record");
    }

    assert_eq!(fixture.db.last_group_id(1, 1).expect("last"), 0);
    assert_eq!(
        fixture.db.mint_count(1, 1, 0).expect("count"),
        TEST_GROUP_SIZE as u64
    );

    let overflow = new_coin();
    assert_eq!(
        fixture.db.record_mint(1, 1, overflow, 11).expect("record"),
        (1, 0)
    );
    assert_eq!(fixture.db.last_group_id(1, 1).expect("last"), 1);
    assert_eq!(fixture.db.mint_count(1, 1, 1).expect("count"), 1);
}

#[test]
fn anonymity_group_spans_only_its_group() {
    let mut fixture = new_fixture();
    let coins = new_coins(10);
    for coin in &coins {
        fixture.db.record_mint(1, 1, *coin, 10).expect("record");
    }
    let filler = new_coin();
    for _ in coins.len()..TEST_GROUP_SIZE as usize {
        fixture.db.record_mint(1, 1, filler, 10).expect("record");
    }
    let group1_coins = new_coins(10);
    for coin in &group1_coins {
        fixture.db.record_mint(1, 1, *coin, 10).expect("record");
    }

    assert_eq!(
        fixture.db.anonymity_group(1, 1, 1, 11).expect("get"),
        group1_coins
    );
    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 10).expect("get"),
        coins
    );
    assert_eq!(
        fixture.db.anonymity_group(1, 1, 1, 5).expect("get"),
        group1_coins[..5]
    );
}

#[test]
fn delete_on_empty_store_is_noop() {
    let mut fixture = new_fixture();

    assert_eq!(fixture.db.next_sequence(), 0);
    fixture.db.delete_from_block(1).expect("delete");
    assert_eq!(fixture.db.next_sequence(), 0);
    assert!(fixture.recorder.removed.borrow().is_empty());
}

#[test]
fn delete_above_every_block_is_noop() {
    let mut fixture = new_fixture();
    let coin = new_coin();
    fixture.db.record_mint(1, 1, coin, 10).expect("record");

    fixture.db.delete_from_block(11).expect("delete");

    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 1).expect("get"),
        vec![coin]
    );
    assert_eq!(fixture.db.next_sequence(), 1);
    assert!(fixture.recorder.removed.borrow().is_empty());
}

#[test]
fn delete_one_coin() {
    let mut fixture = new_fixture();
    let coin = new_coin();
    fixture.db.record_mint(1, 1, coin, 10).expect("record");

    fixture.db.delete_from_block(10).expect("delete");

    assert!(fixture.db.anonymity_group(1, 1, 0, 1).expect("get").is_empty());
    assert_eq!(fixture.db.next_sequence(), 0);

    let removed = fixture.recorder.removed.borrow();
    assert_eq!(removed.len(), 1);
    assert_eq!(
        removed[0],
        MintRemoved {
            property: 1,
            denomination: 1,
            pub_key: coin,
        }
    );
}

#[test]
fn delete_newest_of_two_coins() {
    let mut fixture = new_fixture();
    let coins = new_coins(2);
    fixture.db.record_mint(1, 1, coins[0], 10).expect("record");
    fixture.db.record_mint(1, 1, coins[1], 11).expect("record");

    fixture.db.delete_from_block(11).expect("delete");

    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 2).expect("get"),
        coins[..1]
    );
    assert_eq!(fixture.db.next_sequence(), 1);

    let removed = fixture.recorder.removed.borrow();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].pub_key, coins[1]);
}

#[test]
fn delete_across_denominations_notifies_newest_first() {
    let mut fixture = new_fixture();
    let coins = new_coins(2);
    let denom2_coins = new_coins(2);

    fixture.db.record_mint(1, 0, coins[0], 10).expect("record");
    fixture.db.record_mint(1, 1, denom2_coins[0], 10).expect("record");
    fixture.db.record_mint(1, 0, coins[1], 11).expect("record");
    fixture.db.record_mint(1, 1, denom2_coins[1], 12).expect("record");

    assert_eq!(fixture.db.next_sequence(), 4);

    fixture.db.delete_from_block(11).expect("delete");

    assert_eq!(
        fixture.db.anonymity_group(1, 0, 0, 2).expect("get"),
        coins[..1]
    );
    assert_eq!(
        fixture.db.anonymity_group(1, 1, 0, 2).expect("get"),
        denom2_coins[..1]
    );
    assert_eq!(fixture.db.next_sequence(), 2);

    let removed = fixture.recorder.removed.borrow();
    assert_eq!(removed.len(), 2);
    assert_eq!(removed[0].denomination, 1);
    assert_eq!(removed[0].pub_key, denom2_coins[1]);
    assert_eq!(removed[1].denomination, 0);
    assert_eq!(removed[1].pub_key, coins[1]);
}

#[test]
fn delete_across_properties() {
    let mut fixture = new_fixture();
    let coins = new_coins(2);
    let property2_coins = new_coins(2);

    fixture.db.record_mint(1, 0, coins[0], 10).expect("record");
    fixture.db.record_mint(2, 0, property2_coins[0], 10).expect("record");
    fixture.db.record_mint(1, 0, coins[1], 11).expect("record");
    fixture.db.record_mint(2, 0, property2_coins[1], 12).expect("record");

    fixture.db.delete_from_block(11).expect("delete");

    assert_eq!(
        fixture.db.anonymity_group(1, 0, 0, 2).expect("get"),
        coins[..1]
    );
    assert_eq!(
        fixture.db.anonymity_group(2, 0, 0, 2).expect("get"),
        property2_coins[..1]
    );
    assert_eq!(fixture.db.next_sequence(), 2);
}

#[test]
fn delete_retracts_last_group() {
    let mut fixture = new_fixture();
    let coins = new_coins(2);
    let group1_coins = new_coins(2);
    fixture.db.record_mint(1, 0, coins[0], 10).expect("record");
    fixture.db.record_mint(1, 0, coins[1], 11).expect("record");

    let mut coin_count = 2;
    while coin_count < TEST_GROUP_SIZE as usize {
        fixture.db.record_mint(1, 0, coins[0], 11).expect("record");
        coin_count += 1;
    }

    assert_eq!(
        fixture.db.record_mint(1, 0, group1_coins[0], 12).expect("record"),
        (1, 0)
    );
    assert_eq!(
        fixture.db.record_mint(1, 0, group1_coins[1], 13).expect("record"),
        (1, 1)
    );
    assert_eq!(fixture.db.last_group_id(1, 0).expect("last"), 1);
    assert_eq!(fixture.db.next_sequence(), coin_count as u64 + 2);

    fixture.db.delete_from_block(11).expect("delete");

    assert_eq!(
        fixture.db.anonymity_group(1, 0, 0, 2).expect("get"),
        coins[..1]
    );
    assert!(fixture.db.anonymity_group(1, 0, 1, 1).expect("get").is_empty());
    assert_eq!(fixture.db.next_sequence(), 1);
    assert_eq!(fixture.db.last_group_id(1, 0).expect("last"), 0);
}

#[test]
fn deep_delete_cascades_across_trailing_groups() {
    let mut fixture = new_fixture();
    let size = TEST_GROUP_SIZE as usize;

    // Group 0 entirely at block 10, group 1 entirely at block 11, group 2
    // starts at block 12.
    for coin in new_coins(size) {
        fixture.db.record_mint(1, 0, coin, 10).expect("record");
    }
    for coin in new_coins(size) {
        fixture.db.record_mint(1, 0, coin, 11).expect("record");
    }
    let tip_coin = new_coin();
    assert_eq!(
        fixture.db.record_mint(1, 0, tip_coin, 12).expect("record"),
        (2, 0)
    );
    assert_eq!(fixture.db.last_group_id(1, 0).expect("last"), 2);

    fixture.db.delete_from_block(11).expect("delete");

    // Both trailing groups drained; the cursor walks all the way back.
    assert_eq!(fixture.db.last_group_id(1, 0).expect("last"), 0);
    assert_eq!(fixture.db.mint_count(1, 0, 0).expect("count"), size as u64);
    assert_eq!(fixture.db.mint_count(1, 0, 1).expect("count"), 0);
    assert_eq!(fixture.db.mint_count(1, 0, 2).expect("count"), 0);
    assert_eq!(fixture.db.next_sequence(), size as u64);
    assert_eq!(fixture.recorder.removed.borrow().len(), size + 1);

    // The freed slots are reused by the next insert.
    assert_eq!(
        fixture.db.record_mint(1, 0, new_coin(), 13).expect("record"),
        (1, 0)
    );
    assert_eq!(fixture.db.last_group_id(1, 0).expect("last"), 1);
}

#[test]
fn reopen_recovers_sequence_and_group_size() {
    let store = Arc::new(MemoryStore::new());
    {
        let mut fixture = new_fixture_with(Arc::clone(&store), 10).expect("open");
        for coin in new_coins(3) {
            fixture.db.record_mint(1, 0, coin, 10).expect("record");
        }
        assert_eq!(fixture.db.next_sequence(), 3);
    }

    let fixture = new_fixture_with(store, 0).expect("reopen");
    assert_eq!(fixture.db.group_size(), 10);
    assert_eq!(fixture.db.next_sequence(), 3);
    assert_eq!(fixture.db.mint_count(1, 0, 0).expect("count"), 3);
}

#[test]
fn group_size_defaults_to_max() {
    let fixture = new_fixture_with(Arc::new(MemoryStore::new()), 0).expect("open");
    assert_eq!(fixture.db.group_size(), MAX_GROUP_SIZE);
}

#[test]
fn group_size_custom() {
    let fixture = new_fixture_with(Arc::new(MemoryStore::new()), 120).expect("open");
    assert_eq!(fixture.db.group_size(), 120);
}

#[test]
fn group_size_exceeding_limit_is_rejected() {
    match new_fixture_with(Arc::new(MemoryStore::new()), MAX_GROUP_SIZE + 1) {
        Err(LedgerError::InvalidArgument(message)) => {
            assert_eq!(message, "group size exceed limit");
        }
        other => panic!("expected InvalidArgument, got {:?}", other.err()),
    }
}

#[test]
fn group_size_conflicting_with_database_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    new_fixture_with(Arc::clone(&store), 10).expect("open");

    match new_fixture_with(store, 11) {
        Err(LedgerError::InvalidArgument(message)) => {
            assert_eq!(
                message,
                "group size input isn't equal to group size in database"
            );
        }
        other => panic!("expected InvalidArgument, got {:?}", other.err()),
    }
}

#[test]
fn unsubscribed_observer_stops_receiving_events() {
    let mut db = MintGroupDb::new(Arc::new(MemoryStore::new()), TEST_GROUP_SIZE).expect("open");
    let first = Recorder::default();
    let second = Recorder::default();
    let first_id = db.subscribe(Box::new(first.clone()));
    db.subscribe(Box::new(second.clone()));

    db.record_mint(1, 0, new_coin(), 10).expect("record");
    assert_eq!(first.added.borrow().len(), 1);
    assert_eq!(second.added.borrow().len(), 1);

    assert!(db.unsubscribe(first_id).is_some());
    assert!(db.unsubscribe(first_id).is_none());

    db.record_mint(1, 0, new_coin(), 11).expect("record");
    assert_eq!(first.added.borrow().len(), 1);
    assert_eq!(second.added.borrow().len(), 2);
}
