// Write path tests
// Data rows, index completeness, tag payloads, validation and flushing.

mod common;

use std::sync::Arc;

use common::{client, client_with, long, people_columns, scan_prefix, values};
use kvtable::client::write::VALUE_QUALIFIER;
use kvtable::rowkey::value::ColumnType;
use kvtable::rowkey::{
    RowFamily, SortOrder, null_index_key, ordered_index_key, reverse_index_key,
    secondary_index_key, table_prefix, value_index_key,
};
use kvtable::store::KvStore;
use kvtable::{ColumnDef, ColumnMetadata, Error, MemStore, Options, Tag, TableClient};

// =============================================================================
// Test 1: Non-null columns read back; null columns are absent
// =============================================================================
#[test]
fn row_reads_back_without_nulls() {
    let (_store, client) = client();
    client.create_table("people", &people_columns()).unwrap();

    let row_id = client
        .write_row(
            "people",
            &values(&[("name", Some(b"ann".as_slice())), ("age", Some(long(41).as_slice())), ("nickname", None)]),
            None,
        )
        .unwrap();

    let cells = client.get_data_row(row_id, "people").unwrap().unwrap();
    let row = client.parse_row(&cells, "people").unwrap();
    assert_eq!(row.len(), 2);
    assert_eq!(row["name"], b"ann");
    assert_eq!(row["age"], long(41));
    assert!(!row.contains_key("nickname"));
}

// =============================================================================
// Test 2: An all-null row still exists and parses to an empty map
// =============================================================================
#[test]
fn all_null_row_exists() {
    let (_store, client) = client();
    client.create_table("people", &people_columns()).unwrap();

    let row_id = client
        .write_row("people", &values(&[("nickname", None)]), None)
        .unwrap();

    let cells = client.get_data_row(row_id, "people").unwrap().unwrap();
    assert_eq!(cells.len(), 1);
    assert!(client.parse_row(&cells, "people").unwrap().is_empty());
}

// =============================================================================
// Test 3: Every index family gets its entry for the written row
// =============================================================================
#[test]
fn every_index_entry_is_written() {
    let (store, client) = client();
    let info = client.create_table("people", &people_columns()).unwrap();
    let (t, name, age, nick) = (
        info.id(),
        info.column_id("name").unwrap(),
        info.column_id("age").unwrap(),
        info.column_id("nickname").unwrap(),
    );

    let row_id = client
        .write_row(
            "people",
            &values(&[("name", Some(b"ann".as_slice())), ("age", Some(long(-3).as_slice())), ("nickname", None)]),
            None,
        )
        .unwrap();

    for (column, ty, raw) in [(name, ColumnType::String, b"ann".to_vec()), (age, ColumnType::Long, long(-3))] {
        let key = value_index_key(t, column, ty, &raw, row_id).unwrap();
        assert!(store.get(&key).unwrap().is_some());

        let key = secondary_index_key(t, column, ty, &raw).unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap()[VALUE_QUALIFIER], raw);

        let key = reverse_index_key(t, column, ty, &raw).unwrap();
        assert_eq!(store.get(&key).unwrap().unwrap()[VALUE_QUALIFIER], raw);

        let key = ordered_index_key(SortOrder::Ascending, t, column, ty, Some(raw.as_slice()), row_id).unwrap();
        assert!(store.get(&key).unwrap().is_some());
    }

    assert!(store.get(&null_index_key(t, nick, row_id)).unwrap().is_some());
    let null_ordered =
        ordered_index_key(SortOrder::Ascending, t, nick, ColumnType::String, None, row_id).unwrap();
    assert!(store.get(&null_ordered).unwrap().is_some());

    // Exactly the expected number of rows per family
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::Data, t)).len(), 1);
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::ValueIndex, t)).len(), 2);
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::AscIndex, t)).len(), 3);
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::NullIndex, t)).len(), 1);
    assert!(scan_prefix(&store, &table_prefix(RowFamily::DescIndex, t)).is_empty());
}

// =============================================================================
// Test 4: The tag payload lands on forward, ordered and null index cells
// =============================================================================
#[test]
fn tag_payload_is_carried() {
    let (store, client) = client();
    let info = client.create_table("people", &people_columns()).unwrap();
    let tag = Tag::new(b"src".to_vec(), b"import-7".to_vec());

    let row_id = client
        .write_row(
            "people",
            &values(&[("name", Some(b"bo".as_slice())), ("nickname", None)]),
            Some(&tag),
        )
        .unwrap();

    let name = info.column_id("name").unwrap();
    let nick = info.column_id("nickname").unwrap();

    let forward = value_index_key(info.id(), name, ColumnType::String, b"bo", row_id).unwrap();
    let null = null_index_key(info.id(), nick, row_id);
    for key in [forward, null] {
        let cells = store.get(&key).unwrap().unwrap();
        assert_eq!(cells[b"src".as_slice()], b"import-7");
    }
}

// =============================================================================
// Test 5: Descending columns index into the descending family only
// =============================================================================
#[test]
fn descending_column_uses_desc_family() {
    let (store, client) = client();
    let columns = [ColumnDef::new("score")
        .with(ColumnMetadata::Double)
        .with(ColumnMetadata::Descending)];
    let info = client.create_table("scores", &columns).unwrap();

    for score in [1.5f64, -2.0, 10.25] {
        let raw = score.to_be_bytes();
        client
            .write_row("scores", &values(&[("score", Some(raw.as_slice()))]), None)
            .unwrap();
    }

    assert!(scan_prefix(&store, &table_prefix(RowFamily::AscIndex, info.id())).is_empty());
    let desc = scan_prefix(&store, &table_prefix(RowFamily::DescIndex, info.id()));
    assert_eq!(desc.len(), 3);

    // Scan order is highest score first
    let order: Vec<f64> = desc
        .iter()
        .map(|row| match kvtable::rowkey::RowKey::decode(&row.key).unwrap() {
            kvtable::rowkey::RowKey::OrderedIndex { value: Some(v), .. } => {
                let raw = kvtable::rowkey::value::from_sortable(ColumnType::Double, &v).unwrap();
                f64::from_be_bytes(raw.try_into().unwrap())
            }
            other => panic!("unexpected key {other:?}"),
        })
        .collect();
    assert_eq!(order, vec![10.25, 1.5, -2.0]);
}

// =============================================================================
// Test 6: Unknown columns and bad values fail before anything is written
// =============================================================================
#[test]
fn rejected_rows_write_nothing() {
    let (store, client) = client();
    client.create_table("people", &people_columns()).unwrap();
    let rows_before = store.row_count();

    let err = client
        .write_row("people", &values(&[("name", Some(b"x".as_slice())), ("shoe_size", Some(b"9".as_slice()))]), None)
        .unwrap_err();
    assert!(matches!(err, Error::ColumnNotFound { ref column, .. } if column == "shoe_size"));

    let err = client
        .write_row("people", &values(&[("name", Some(b"x".as_slice())), ("age", Some(b"abc".as_slice()))]), None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidValue { column_type: "LONG", .. }));

    assert!(matches!(
        client.write_row("ghost", &values(&[]), None),
        Err(Error::TableNotFound { .. })
    ));
    assert_eq!(store.row_count(), rows_before);
}

// =============================================================================
// Test 7: Row ids are unique; duplicate values make distinct rows
// =============================================================================
#[test]
fn identical_rows_get_distinct_ids() {
    let (store, client) = client();
    let info = client.create_table("people", &people_columns()).unwrap();
    let row = values(&[("name", Some(b"same".as_slice()))]);

    let a = client.write_row("people", &row, None).unwrap();
    let b = client.write_row("people", &row, None).unwrap();
    assert_ne!(a, b);
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::Data, info.id())).len(), 2);
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::ValueIndex, info.id())).len(), 2);
    // The secondary entry is keyed by value alone and is shared
    assert_eq!(scan_prefix(&store, &table_prefix(RowFamily::SecondaryIndex, info.id())).len(), 1);
}

// =============================================================================
// Test 8: Crossing the write buffer size flushes and records telemetry
// =============================================================================
#[test]
fn flush_telemetry_counts_threshold_crossings() {
    let (_store, eager) = client();
    eager.create_table("people", &people_columns()).unwrap();
    for _ in 0..3 {
        eager.write_row("people", &values(&[("name", Some(b"a".as_slice()))]), None).unwrap();
    }
    let stats = eager.stats();
    assert_eq!(stats.flush_count, 3);
    assert!(stats.total_flush_time >= stats.last_flush_time);

    let (_store, lazy) = client_with(Options::default().write_buffer_size(1 << 30));
    lazy.create_table("people", &people_columns()).unwrap();
    lazy.write_row("people", &values(&[("name", Some(b"a".as_slice()))]), None).unwrap();
    assert_eq!(lazy.stats().flush_count, 0);
    assert_eq!(lazy.stats().average_flush_time(), std::time::Duration::ZERO);
}

// =============================================================================
// Test 9: With autoflush off, rows become visible after flush_writes
// =============================================================================
#[test]
fn buffered_rows_visible_after_flush() {
    let (store, client) = client_with(
        Options::default()
            .auto_flush(false)
            .write_buffer_size(1 << 20),
    );
    client.create_table("people", &people_columns()).unwrap();

    let row_id = client
        .write_row("people", &values(&[("name", Some(b"late".as_slice()))]), None)
        .unwrap();
    assert!(store.buffered_puts() > 0);
    assert_eq!(client.get_data_row(row_id, "people").unwrap(), None);

    client.flush_writes().unwrap();
    assert_eq!(store.buffered_puts(), 0);
    assert!(client.get_data_row(row_id, "people").unwrap().is_some());
}

// =============================================================================
// Test 10: Connecting to an unreachable store fails; no client is built
// =============================================================================
#[test]
fn connect_fails_when_offline() {
    let store = Arc::new(MemStore::new());
    store.set_offline(true);
    let dyn_store: Arc<dyn KvStore> = store.clone();

    let result = TableClient::connect(dyn_store, Options::default());
    assert!(matches!(result, Err(Error::StorageConnectivity(_))));
}

// =============================================================================
// Test 11: parse_row rejects cells that are not column ids of the table
// =============================================================================
#[test]
fn parse_row_rejects_foreign_cells() {
    let (_store, client) = client();
    client.create_table("people", &people_columns()).unwrap();

    let mut cells = kvtable::types::Cells::new();
    cells.insert(99u64.to_be_bytes().to_vec(), b"v".to_vec());
    assert!(matches!(
        client.parse_row(&cells, "people"),
        Err(Error::UnknownColumnId { column_id: 99, .. })
    ));

    let mut cells = kvtable::types::Cells::new();
    cells.insert(b"abc".to_vec(), b"v".to_vec());
    assert!(matches!(
        client.parse_row(&cells, "people"),
        Err(Error::MalformedKey { family: "DATA", .. })
    ));
}
