// Schema tests
// Table creation, metadata loading, id assignment and the schema cache.

mod common;

use std::sync::Arc;

use common::{client, people_columns};
use kvtable::rowkey::{column_info_key, columns_key, root_key};
use kvtable::rowkey::value::ColumnType;
use kvtable::rowkey::SortOrder;
use kvtable::schema::cache::load_table_info;
use kvtable::store::{KvStore, Put};
use kvtable::{ColumnDef, ColumnMetadata, Error, TableClient};

// =============================================================================
// Test 1: create_table registers ids and columns that resolve again cold
// =============================================================================
#[test]
fn create_table_resolves_from_store() {
    let (store, client) = client();
    let created = client.create_table("people", &people_columns()).unwrap();
    assert_eq!(created.id(), 1);
    assert_eq!(created.column_count(), 3);

    // A second client has an empty cache and must load from the store
    let other = TableClient::connect(store.clone(), Default::default()).unwrap();
    let loaded = other.table_info("people").unwrap();
    assert_eq!(*loaded, *created);

    let root = store.get(&root_key()).unwrap().unwrap();
    assert_eq!(root[b"people".as_slice()], 1u64.to_be_bytes().to_vec());
}

// =============================================================================
// Test 2: Column ids follow the order the caller listed the columns in
// =============================================================================
#[test]
fn column_ids_follow_caller_order() {
    let (_store, client) = client();
    let columns = vec![
        ColumnDef::new("zeta"),
        ColumnDef::new("alpha"),
        ColumnDef::new("mid"),
    ];
    let info = client.create_table("t", &columns).unwrap();

    assert_eq!(info.column_id("zeta"), Some(1));
    assert_eq!(info.column_id("alpha"), Some(2));
    assert_eq!(info.column_id("mid"), Some(3));
    assert_eq!(info.column_name(2), Some("alpha"));
    assert_eq!(info.column_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
}

// =============================================================================
// Test 3: Metadata flags survive the round trip and derive type and order
// =============================================================================
#[test]
fn metadata_flags_round_trip() {
    let (store, client) = client();
    let columns = vec![
        ColumnDef::new("score")
            .with(ColumnMetadata::Double)
            .with(ColumnMetadata::Descending)
            .with(ColumnMetadata::IsNullable),
        ColumnDef::new("blob"),
    ];
    client.create_table("scores", &columns).unwrap();

    let info = load_table_info(store.as_ref(), "scores").unwrap();
    let score = info.column_id("score").unwrap();
    let blob = info.column_id("blob").unwrap();

    assert!(info.has_flag(score, ColumnMetadata::IsNullable));
    assert!(!info.has_flag(score, ColumnMetadata::PrimaryKey));
    assert_eq!(info.column_type(score), ColumnType::Double);
    assert_eq!(info.sort_order(score), SortOrder::Descending);

    assert!(info.metadata(blob).is_empty());
    assert_eq!(info.column_type(blob), ColumnType::Binary);
    assert_eq!(info.sort_order(blob), SortOrder::Ascending);
}

// =============================================================================
// Test 4: Unknown flag qualifiers are skipped; known ones parse any case
// =============================================================================
#[test]
fn unknown_flags_are_skipped() {
    let (store, client) = client();
    let info = client.create_table("t", &[ColumnDef::new("c")]).unwrap();
    let column_id = info.column_id("c").unwrap();

    store
        .put_batch(vec![
            Put::new(column_info_key(info.id(), column_id))
                .cell(b"COMPRESSED".as_slice(), b"c".as_slice())
                .cell(b"long".as_slice(), b"c".as_slice()),
        ])
        .unwrap();

    let loaded = load_table_info(store.as_ref(), "t").unwrap();
    assert_eq!(loaded.metadata(column_id), &[ColumnMetadata::Long]);
    assert_eq!(ColumnMetadata::parse(b"Is_Nullable"), Some(ColumnMetadata::IsNullable));
    assert_eq!(ColumnMetadata::parse(b"\xFF"), None);
}

// =============================================================================
// Test 5: Creating an existing table fails and leaves it untouched
// =============================================================================
#[test]
fn duplicate_create_fails() {
    let (store, client) = client();
    client.create_table("people", &people_columns()).unwrap();

    let err = client.create_table("people", &[ColumnDef::new("x")]).unwrap_err();
    assert!(matches!(err, Error::TableExists { ref name } if name == "people"));

    // No id was consumed by the failed attempt
    let next = client.create_table("other", &[]).unwrap();
    assert_eq!(next.id(), 2);
    let info = load_table_info(store.as_ref(), "people").unwrap();
    assert_eq!(info.column_count(), 3);
}

// =============================================================================
// Test 6: Unknown tables, empty names and duplicate columns are rejected
// =============================================================================
#[test]
fn invalid_definitions_rejected() {
    let (_store, client) = client();

    assert!(matches!(client.table_info("ghost"), Err(Error::TableNotFound { .. })));
    assert!(matches!(
        client.create_table("", &[]),
        Err(Error::EmptyName { kind: "table" })
    ));
    assert!(matches!(
        client.create_table("t", &[ColumnDef::new("")]),
        Err(Error::EmptyName { kind: "column" })
    ));
    assert!(matches!(
        client.create_table("t", &[ColumnDef::new("a"), ColumnDef::new("a")]),
        Err(Error::ColumnExists { .. })
    ));
    assert!(matches!(client.table_info("t"), Err(Error::TableNotFound { .. })));
}

// =============================================================================
// Test 7: add_columns extends the id block and refreshes the cache
// =============================================================================
#[test]
fn add_columns_extends_table() {
    let (store, client) = client();
    let before = client.create_table("people", &people_columns()).unwrap();

    let after = client
        .add_columns("people", &[ColumnDef::new("email").with(ColumnMetadata::String)])
        .unwrap();
    assert_eq!(after.column_id("email"), Some(4));
    assert_eq!(after.column_count(), 4);
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(Arc::ptr_eq(&after, &client.table_info("people").unwrap()));

    let loaded = load_table_info(store.as_ref(), "people").unwrap();
    assert_eq!(loaded, *after);

    let err = client.add_columns("people", &[ColumnDef::new("age")]).unwrap_err();
    assert!(matches!(err, Error::ColumnExists { ref column, .. } if column == "age"));
}

// =============================================================================
// Test 8: The cache serves one shared entry until invalidated
// =============================================================================
#[test]
fn cache_shares_and_invalidates() {
    let (store, client) = client();
    client.create_table("people", &people_columns()).unwrap();

    let a = client.table_info("people").unwrap();
    let b = client.table_info("people").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(client.schema().len(), 1);

    // A column added behind the cache's back is seen only after invalidation
    store
        .put_batch(vec![Put::new(columns_key(a.id())).cell(b"late".as_slice(), 9u64.to_be_bytes())])
        .unwrap();
    assert_eq!(client.table_info("people").unwrap().column_id("late"), None);

    assert!(client.schema().invalidate("people"));
    assert!(!client.schema().invalidate("people"));
    assert_eq!(client.table_info("people").unwrap().column_id("late"), Some(9));
}
