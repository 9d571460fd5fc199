use anonmint_storage::memory::MemoryStore;
use anonmint_storage::{Column, KeyValueStore, WriteBatch};

#[test]
fn prefix_scan_is_ordered_and_bounded() {
    let store = MemoryStore::new();
    store.put(Column::MintRecord, b"aa\x02", b"2").expect("put");
    store.put(Column::MintRecord, b"aa\x01", b"1").expect("put");
    store.put(Column::MintRecord, b"ab\x01", b"x").expect("put");
    store.put(Column::MintSequence, b"aa\x03", b"y").expect("put");

    let entries = store.scan_prefix(Column::MintRecord, b"aa").expect("scan");
    assert_eq!(
        entries,
        vec![
            (b"aa\x01".to_vec(), b"1".to_vec()),
            (b"aa\x02".to_vec(), b"2".to_vec()),
        ]
    );
}

#[test]
fn batch_applies_puts_and_deletes() {
    let store = MemoryStore::new();
    store.put(Column::Meta, b"stale", b"old").expect("put");

    let mut batch = WriteBatch::new();
    batch.put(Column::Meta, b"fresh", b"new");
    batch.delete(Column::Meta, b"stale");
    store.write_batch(&batch).expect("batch");

    assert_eq!(
        store.get(Column::Meta, b"fresh").expect("get"),
        Some(b"new".to_vec())
    );
    assert!(store.get(Column::Meta, b"stale").expect("get").is_none());
}

#[test]
fn wipe_discards_everything() {
    let store = MemoryStore::new();
    store.put(Column::Meta, b"key", b"value").expect("put");
    store.wipe();
    assert!(store.get(Column::Meta, b"key").expect("get").is_none());
}
