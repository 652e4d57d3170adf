#![allow(dead_code)]

use std::sync::Arc;

use kvtable::rowkey::prefix_successor;
use kvtable::store::{KvStore, ScanRequest, ScannedRow};
use kvtable::{ColumnDef, ColumnMetadata, ColumnValues, MemStore, Options, TableClient};

/// A client over a fresh in-memory store, plus the store itself.
pub fn client() -> (Arc<MemStore>, TableClient) {
    client_with(Options::default())
}

pub fn client_with(options: Options) -> (Arc<MemStore>, TableClient) {
    let store = Arc::new(MemStore::new());
    let dyn_store: Arc<dyn KvStore> = store.clone();
    let client = TableClient::connect(dyn_store, options).unwrap();
    (store, client)
}

/// `people(name STRING, age LONG, nickname STRING)`
pub fn people_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("name").with(ColumnMetadata::String),
        ColumnDef::new("age").with(ColumnMetadata::Long),
        ColumnDef::new("nickname")
            .with(ColumnMetadata::String)
            .with(ColumnMetadata::IsNullable),
    ]
}

pub fn long(v: i64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

pub fn values(pairs: &[(&str, Option<&[u8]>)]) -> ColumnValues {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.map(<[u8]>::to_vec)))
        .collect()
}

/// Every live row whose key starts with `prefix`.
pub fn scan_prefix(store: &MemStore, prefix: &[u8]) -> Vec<ScannedRow> {
    let request = ScanRequest::range(prefix.to_vec(), prefix_successor(prefix).unwrap_or_default());
    store
        .scan(request)
        .unwrap()
        .map(|row| row.unwrap())
        .filter(|row| row.key.starts_with(prefix))
        .collect()
}
