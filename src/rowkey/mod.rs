//! Row key encoding for every row family.
//!
//! All tables share one flat, byte-sorted key space. Each key starts with
//! a one-byte family prefix followed by fixed-order fields:
//!
//! ```text
//! ROOT            00
//! COLUMNS         01 | table
//! COLUMN_INFO     02 | table | column
//! DATA            03 | table | row_id
//! VALUE_INDEX     04 | table | column | value        | row_id
//! SECONDARY_INDEX 05 | table | column | value
//! REVERSE_INDEX   06 | table | column | ~value
//! ASC_INDEX       07 | table | column | 01 value     | row_id   (null: 00)
//! DESC_INDEX      08 | table | column | 00 ~value    | row_id   (null: 01)
//! NULL_INDEX      09 | table | column | row_id
//! ```
//!
//! `table` and `column` are 8-byte big-endian ids, `row_id` is 16 bytes,
//! `value` is an escaped sortable segment (see [`value`]) and `~` is the
//! bitwise complement. Numeric id order equals byte order, so a table's
//! rows in one family form a contiguous range starting at
//! [`table_prefix`].

pub mod value;

use crate::error::{Error, Result};
use crate::types::{ColumnId, ROW_ID_LEN, RowId, TableId};

use value::{ColumnType, complement, escape, to_sortable, unescape};

const ID_LEN: usize = 8;

/// Key prefix byte of each row family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RowFamily {
    Root = 0x00,
    Columns = 0x01,
    ColumnInfo = 0x02,
    Data = 0x03,
    ValueIndex = 0x04,
    SecondaryIndex = 0x05,
    ReverseIndex = 0x06,
    AscIndex = 0x07,
    DescIndex = 0x08,
    NullIndex = 0x09,
}

/// Every index family, in the order bulk deletes clear them.
pub const INDEX_FAMILIES: [RowFamily; 6] = [
    RowFamily::ValueIndex,
    RowFamily::SecondaryIndex,
    RowFamily::ReverseIndex,
    RowFamily::AscIndex,
    RowFamily::DescIndex,
    RowFamily::NullIndex,
];

/// Index families whose keys end in a row id and can be targeted by a
/// row delete.
pub const ROW_INDEX_FAMILIES: [RowFamily; 4] = [
    RowFamily::ValueIndex,
    RowFamily::AscIndex,
    RowFamily::DescIndex,
    RowFamily::NullIndex,
];

impl RowFamily {
    pub fn prefix(self) -> u8 {
        self as u8
    }

    pub fn from_prefix(byte: u8) -> Option<Self> {
        let family = match byte {
            0x00 => RowFamily::Root,
            0x01 => RowFamily::Columns,
            0x02 => RowFamily::ColumnInfo,
            0x03 => RowFamily::Data,
            0x04 => RowFamily::ValueIndex,
            0x05 => RowFamily::SecondaryIndex,
            0x06 => RowFamily::ReverseIndex,
            0x07 => RowFamily::AscIndex,
            0x08 => RowFamily::DescIndex,
            0x09 => RowFamily::NullIndex,
            _ => return None,
        };
        Some(family)
    }

    pub fn name(self) -> &'static str {
        match self {
            RowFamily::Root => "ROOT",
            RowFamily::Columns => "COLUMNS",
            RowFamily::ColumnInfo => "COLUMN_INFO",
            RowFamily::Data => "DATA",
            RowFamily::ValueIndex => "VALUE_INDEX",
            RowFamily::SecondaryIndex => "SECONDARY_INDEX",
            RowFamily::ReverseIndex => "REVERSE_INDEX",
            RowFamily::AscIndex => "ASC_INDEX",
            RowFamily::DescIndex => "DESC_INDEX",
            RowFamily::NullIndex => "NULL_INDEX",
        }
    }
}

/// Direction of an ordered index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn family(self) -> RowFamily {
        match self {
            SortOrder::Ascending => RowFamily::AscIndex,
            SortOrder::Descending => RowFamily::DescIndex,
        }
    }

    /// (not-null, null) sentinel bytes. Ascending puts nulls first,
    /// descending puts them last.
    fn sentinels(self) -> (u8, u8) {
        match self {
            SortOrder::Ascending => (0x01, 0x00),
            SortOrder::Descending => (0x00, 0x01),
        }
    }
}

/// A decoded row key.
///
/// Index variants carry the value in sortable form (after
/// [`value::to_sortable`], before escaping); use
/// [`value::from_sortable`] with the column's type to get the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKey {
    Root,
    Columns {
        table_id: TableId,
    },
    ColumnInfo {
        table_id: TableId,
        column_id: ColumnId,
    },
    Data {
        table_id: TableId,
        row_id: RowId,
    },
    ValueIndex {
        table_id: TableId,
        column_id: ColumnId,
        value: Vec<u8>,
        row_id: RowId,
    },
    SecondaryIndex {
        table_id: TableId,
        column_id: ColumnId,
        value: Vec<u8>,
    },
    ReverseIndex {
        table_id: TableId,
        column_id: ColumnId,
        value: Vec<u8>,
    },
    OrderedIndex {
        order: SortOrder,
        table_id: TableId,
        column_id: ColumnId,
        value: Option<Vec<u8>>,
        row_id: RowId,
    },
    NullIndex {
        table_id: TableId,
        column_id: ColumnId,
        row_id: RowId,
    },
}

impl RowKey {
    pub fn family(&self) -> RowFamily {
        match self {
            RowKey::Root => RowFamily::Root,
            RowKey::Columns { .. } => RowFamily::Columns,
            RowKey::ColumnInfo { .. } => RowFamily::ColumnInfo,
            RowKey::Data { .. } => RowFamily::Data,
            RowKey::ValueIndex { .. } => RowFamily::ValueIndex,
            RowKey::SecondaryIndex { .. } => RowFamily::SecondaryIndex,
            RowKey::ReverseIndex { .. } => RowFamily::ReverseIndex,
            RowKey::OrderedIndex { order, .. } => order.family(),
            RowKey::NullIndex { .. } => RowFamily::NullIndex,
        }
    }

    /// Row id at the tail of the key, for families that carry one.
    pub fn row_id(&self) -> Option<RowId> {
        match self {
            RowKey::Data { row_id, .. }
            | RowKey::ValueIndex { row_id, .. }
            | RowKey::OrderedIndex { row_id, .. }
            | RowKey::NullIndex { row_id, .. } => Some(*row_id),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(48);
        out.push(self.family().prefix());

        match self {
            RowKey::Root => {}
            RowKey::Columns { table_id } => put_id(&mut out, *table_id),
            RowKey::ColumnInfo {
                table_id,
                column_id,
            } => {
                put_id(&mut out, *table_id);
                put_id(&mut out, *column_id);
            }
            RowKey::Data { table_id, row_id } => {
                put_id(&mut out, *table_id);
                out.extend_from_slice(row_id.as_bytes());
            }
            RowKey::ValueIndex {
                table_id,
                column_id,
                value,
                row_id,
            } => {
                put_id(&mut out, *table_id);
                put_id(&mut out, *column_id);
                escape(value, &mut out);
                out.extend_from_slice(row_id.as_bytes());
            }
            RowKey::SecondaryIndex {
                table_id,
                column_id,
                value,
            } => {
                put_id(&mut out, *table_id);
                put_id(&mut out, *column_id);
                escape(value, &mut out);
            }
            RowKey::ReverseIndex {
                table_id,
                column_id,
                value,
            } => {
                put_id(&mut out, *table_id);
                put_id(&mut out, *column_id);
                let start = out.len();
                escape(value, &mut out);
                complement(&mut out[start..]);
            }
            RowKey::OrderedIndex {
                order,
                table_id,
                column_id,
                value,
                row_id,
            } => {
                put_id(&mut out, *table_id);
                put_id(&mut out, *column_id);
                let (not_null, null) = order.sentinels();
                match value {
                    None => out.push(null),
                    Some(value) => {
                        out.push(not_null);
                        let start = out.len();
                        escape(value, &mut out);
                        if *order == SortOrder::Descending {
                            complement(&mut out[start..]);
                        }
                    }
                }
                out.extend_from_slice(row_id.as_bytes());
            }
            RowKey::NullIndex {
                table_id,
                column_id,
                row_id,
            } => {
                put_id(&mut out, *table_id);
                put_id(&mut out, *column_id);
                out.extend_from_slice(row_id.as_bytes());
            }
        }

        out
    }

    /// Parse a key produced by [`RowKey::encode`].
    ///
    /// Fails with `MalformedKey` when the prefix is unknown, the length
    /// does not fit the family's layout, or a value segment is not
    /// consumed exactly.
    pub fn decode(bytes: &[u8]) -> Result<RowKey> {
        let (&prefix, body) = bytes
            .split_first()
            .ok_or_else(|| Error::malformed("ROW", "empty key"))?;
        let family = RowFamily::from_prefix(prefix)
            .ok_or_else(|| Error::malformed("ROW", format!("unknown family prefix {prefix:#04x}")))?;
        let name = family.name();

        let key = match family {
            RowFamily::Root => {
                expect_len(name, body, 0)?;
                RowKey::Root
            }
            RowFamily::Columns => {
                expect_len(name, body, ID_LEN)?;
                RowKey::Columns {
                    table_id: read_id(body),
                }
            }
            RowFamily::ColumnInfo => {
                expect_len(name, body, 2 * ID_LEN)?;
                RowKey::ColumnInfo {
                    table_id: read_id(body),
                    column_id: read_id(&body[ID_LEN..]),
                }
            }
            RowFamily::Data => {
                expect_len(name, body, ID_LEN + ROW_ID_LEN)?;
                RowKey::Data {
                    table_id: read_id(body),
                    row_id: read_row_id(&body[ID_LEN..]),
                }
            }
            RowFamily::NullIndex => {
                expect_len(name, body, 2 * ID_LEN + ROW_ID_LEN)?;
                RowKey::NullIndex {
                    table_id: read_id(body),
                    column_id: read_id(&body[ID_LEN..]),
                    row_id: read_row_id(&body[2 * ID_LEN..]),
                }
            }
            RowFamily::ValueIndex => {
                let (table_id, column_id, rest) = split_ids(name, body)?;
                let (segment, row_id) = split_row_id(name, rest)?;
                RowKey::ValueIndex {
                    table_id,
                    column_id,
                    value: whole_segment(name, segment, false)?,
                    row_id,
                }
            }
            RowFamily::SecondaryIndex => {
                let (table_id, column_id, rest) = split_ids(name, body)?;
                RowKey::SecondaryIndex {
                    table_id,
                    column_id,
                    value: whole_segment(name, rest, false)?,
                }
            }
            RowFamily::ReverseIndex => {
                let (table_id, column_id, rest) = split_ids(name, body)?;
                RowKey::ReverseIndex {
                    table_id,
                    column_id,
                    value: whole_segment(name, rest, true)?,
                }
            }
            RowFamily::AscIndex | RowFamily::DescIndex => {
                let order = if family == RowFamily::AscIndex {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                };
                let (table_id, column_id, rest) = split_ids(name, body)?;
                let (segment, row_id) = split_row_id(name, rest)?;
                let (&sentinel, segment) = segment
                    .split_first()
                    .ok_or_else(|| Error::malformed(name, "missing null sentinel"))?;
                let (not_null, null) = order.sentinels();
                let value = if sentinel == null {
                    if !segment.is_empty() {
                        return Err(Error::malformed(name, "null entry carries a value"));
                    }
                    None
                } else if sentinel == not_null {
                    Some(whole_segment(
                        name,
                        segment,
                        order == SortOrder::Descending,
                    )?)
                } else {
                    return Err(Error::malformed(
                        name,
                        format!("invalid null sentinel {sentinel:#04x}"),
                    ));
                };
                RowKey::OrderedIndex {
                    order,
                    table_id,
                    column_id,
                    value,
                    row_id,
                }
            }
        };

        Ok(key)
    }
}

fn put_id(out: &mut Vec<u8>, id: u64) {
    out.extend_from_slice(&id.to_be_bytes());
}

/// Caller guarantees at least 8 bytes.
fn read_id(bytes: &[u8]) -> u64 {
    let mut id = [0u8; ID_LEN];
    id.copy_from_slice(&bytes[..ID_LEN]);
    u64::from_be_bytes(id)
}

/// Caller guarantees exactly 16 bytes.
fn read_row_id(bytes: &[u8]) -> RowId {
    let mut id = [0u8; ROW_ID_LEN];
    id.copy_from_slice(bytes);
    RowId::from_bytes(id)
}

fn expect_len(family: &'static str, body: &[u8], expected: usize) -> Result<()> {
    if body.len() != expected {
        return Err(Error::malformed(
            family,
            format!("expected {} bytes, got {}", expected + 1, body.len() + 1),
        ));
    }
    Ok(())
}

fn split_ids<'a>(family: &'static str, body: &'a [u8]) -> Result<(TableId, ColumnId, &'a [u8])> {
    if body.len() < 2 * ID_LEN {
        return Err(Error::malformed(
            family,
            format!("key too short for table and column ids: {} bytes", body.len() + 1),
        ));
    }
    Ok((read_id(body), read_id(&body[ID_LEN..]), &body[2 * ID_LEN..]))
}

fn split_row_id<'a>(family: &'static str, rest: &'a [u8]) -> Result<(&'a [u8], RowId)> {
    if rest.len() < ROW_ID_LEN {
        return Err(Error::malformed(family, "key too short for row id"));
    }
    let (segment, row_id) = rest.split_at(rest.len() - ROW_ID_LEN);
    Ok((segment, read_row_id(row_id)))
}

fn whole_segment(family: &'static str, segment: &[u8], complemented: bool) -> Result<Vec<u8>> {
    let mut buf = segment.to_vec();
    if complemented {
        complement(&mut buf);
    }
    let (value, used) = unescape(family, &buf)?;
    if used != buf.len() {
        return Err(Error::malformed(
            family,
            format!("{} trailing bytes after value", buf.len() - used),
        ));
    }
    Ok(value)
}

/// The single ROOT key holding table name → table id cells.
pub fn root_key() -> Vec<u8> {
    RowKey::Root.encode()
}

pub fn columns_key(table_id: TableId) -> Vec<u8> {
    RowKey::Columns { table_id }.encode()
}

pub fn column_info_key(table_id: TableId, column_id: ColumnId) -> Vec<u8> {
    RowKey::ColumnInfo {
        table_id,
        column_id,
    }
    .encode()
}

pub fn data_key(table_id: TableId, row_id: RowId) -> Vec<u8> {
    RowKey::Data { table_id, row_id }.encode()
}

pub fn value_index_key(
    table_id: TableId,
    column_id: ColumnId,
    column_type: ColumnType,
    raw: &[u8],
    row_id: RowId,
) -> Result<Vec<u8>> {
    Ok(RowKey::ValueIndex {
        table_id,
        column_id,
        value: to_sortable(column_type, raw)?,
        row_id,
    }
    .encode())
}

pub fn secondary_index_key(
    table_id: TableId,
    column_id: ColumnId,
    column_type: ColumnType,
    raw: &[u8],
) -> Result<Vec<u8>> {
    Ok(RowKey::SecondaryIndex {
        table_id,
        column_id,
        value: to_sortable(column_type, raw)?,
    }
    .encode())
}

pub fn reverse_index_key(
    table_id: TableId,
    column_id: ColumnId,
    column_type: ColumnType,
    raw: &[u8],
) -> Result<Vec<u8>> {
    Ok(RowKey::ReverseIndex {
        table_id,
        column_id,
        value: to_sortable(column_type, raw)?,
    }
    .encode())
}

pub fn ordered_index_key(
    order: SortOrder,
    table_id: TableId,
    column_id: ColumnId,
    column_type: ColumnType,
    raw: Option<&[u8]>,
    row_id: RowId,
) -> Result<Vec<u8>> {
    let value = raw.map(|raw| to_sortable(column_type, raw)).transpose()?;
    Ok(RowKey::OrderedIndex {
        order,
        table_id,
        column_id,
        value,
        row_id,
    }
    .encode())
}

pub fn null_index_key(table_id: TableId, column_id: ColumnId, row_id: RowId) -> Vec<u8> {
    RowKey::NullIndex {
        table_id,
        column_id,
        row_id,
    }
    .encode()
}

/// Family prefix plus table id: every key of `family` for that table
/// starts with these 9 bytes.
pub fn table_prefix(family: RowFamily, table_id: TableId) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + ID_LEN);
    out.push(family.prefix());
    put_id(&mut out, table_id);
    out
}

/// Family prefix plus table and column ids (index families and
/// COLUMN_INFO).
pub fn column_prefix(family: RowFamily, table_id: TableId, column_id: ColumnId) -> Vec<u8> {
    let mut out = table_prefix(family, table_id);
    put_id(&mut out, column_id);
    out
}

/// Smallest key greater than every key starting with `prefix`.
///
/// `None` when the prefix is all 0xFF bytes and no such key exists.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.pop() {
        if last != 0xFF {
            next.push(last + 1);
            return Some(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_layout_lengths() {
        let row_id = RowId::from_u128(7);
        assert_eq!(root_key().len(), 1);
        assert_eq!(columns_key(1).len(), 9);
        assert_eq!(column_info_key(1, 2).len(), 17);
        assert_eq!(data_key(1, row_id).len(), 25);
        assert_eq!(null_index_key(1, 2, row_id).len(), 33);
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(&[0x03, 0x01]), Some(vec![0x03, 0x02]));
        assert_eq!(prefix_successor(&[0x03, 0xFF]), Some(vec![0x04]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
    }
}
