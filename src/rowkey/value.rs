//! Order-preserving value encoding for index keys.
//!
//! A column value goes through two steps before it lands in a key:
//!
//! 1. [`to_sortable`] maps the raw bytes to a form whose byte order
//!    matches the value's natural order for its [`ColumnType`].
//! 2. [`escape`] turns that into a self-delimiting segment, so a shorter
//!    value still sorts before a longer one that extends it even when a
//!    row id follows in the key.
//!
//! ```text
//! raw LONG   -5  = FF FF FF FF FF FF FF FB
//! sortable       = 7F FF FF FF FF FF FF FB      (sign bit flipped)
//! escaped        = 7F FF FF FF FF FF FF FB 00 01
//! ```
//!
//! Reverse and descending keys complement every byte of the escaped
//! segment. The segment is prefix-free, so the complement sorts in exactly
//! the opposite order.

use crate::error::{Error, Result};

/// Escape byte: a literal 0x00 in the value is written as `00 FF`.
const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
/// Segment terminator is `00 01`, below every escaped literal.
const TERMINATOR: u8 = 0x01;

const SIGN_FLIP_MASK: u64 = 1u64 << 63;

/// How a column's raw bytes are interpreted for ordering.
///
/// Fixed-width numerics arrive as 8 big-endian bytes. Everything else is
/// ordered as plain bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    #[default]
    Binary,
    String,
    Long,
    ULong,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Binary => "BINARY",
            ColumnType::String => "STRING",
            ColumnType::Long => "LONG",
            ColumnType::ULong => "ULONG",
            ColumnType::Double => "DOUBLE",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::DateTime => "DATETIME",
        }
    }

    /// Byte width the raw value must have, if the type is fixed-width.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Long | ColumnType::ULong | ColumnType::Double => Some(8),
            _ => None,
        }
    }
}

fn read_u64(column_type: ColumnType, bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidValue {
        column_type: column_type.name(),
        reason: format!("expected 8 bytes, got {}", bytes.len()),
    })?;
    Ok(u64::from_be_bytes(array))
}

/// Map a raw column value to bytes whose lexicographic order equals the
/// value's natural order.
pub fn to_sortable(column_type: ColumnType, raw: &[u8]) -> Result<Vec<u8>> {
    match column_type {
        ColumnType::Long => {
            let bits = read_u64(column_type, raw)?;
            Ok((bits ^ SIGN_FLIP_MASK).to_be_bytes().to_vec())
        }
        ColumnType::ULong => {
            read_u64(column_type, raw)?;
            Ok(raw.to_vec())
        }
        ColumnType::Double => {
            // Positive floats get the sign bit set, negative floats are
            // inverted so larger magnitudes sort lower.
            let bits = read_u64(column_type, raw)?;
            let mapped = if bits & SIGN_FLIP_MASK != 0 {
                !bits
            } else {
                bits ^ SIGN_FLIP_MASK
            };
            Ok(mapped.to_be_bytes().to_vec())
        }
        _ => Ok(raw.to_vec()),
    }
}

/// Inverse of [`to_sortable`].
pub fn from_sortable(column_type: ColumnType, sortable: &[u8]) -> Result<Vec<u8>> {
    match column_type {
        ColumnType::Long => {
            let bits = read_u64(column_type, sortable)?;
            Ok((bits ^ SIGN_FLIP_MASK).to_be_bytes().to_vec())
        }
        ColumnType::ULong => {
            read_u64(column_type, sortable)?;
            Ok(sortable.to_vec())
        }
        ColumnType::Double => {
            let mapped = read_u64(column_type, sortable)?;
            let bits = if mapped & SIGN_FLIP_MASK != 0 {
                mapped ^ SIGN_FLIP_MASK
            } else {
                !mapped
            };
            Ok(bits.to_be_bytes().to_vec())
        }
        _ => Ok(sortable.to_vec()),
    }
}

/// Append `sortable` to `out` as a self-delimiting segment.
pub fn escape(sortable: &[u8], out: &mut Vec<u8>) {
    for &byte in sortable {
        if byte == ESCAPE {
            out.extend_from_slice(&[ESCAPE, ESCAPED_ZERO]);
        } else {
            out.push(byte);
        }
    }
    out.extend_from_slice(&[ESCAPE, TERMINATOR]);
}

/// Read one escaped segment from the front of `bytes`.
///
/// Returns the unescaped value and the number of bytes consumed,
/// terminator included.
pub fn unescape(family: &'static str, bytes: &[u8]) -> Result<(Vec<u8>, usize)> {
    let mut value = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte != ESCAPE {
            value.push(byte);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(&ESCAPED_ZERO) => {
                value.push(0);
                i += 2;
            }
            Some(&TERMINATOR) => return Ok((value, i + 2)),
            Some(other) => {
                return Err(Error::malformed(
                    family,
                    format!("invalid escape sequence 00 {other:02X} at offset {i}"),
                ));
            }
            None => break,
        }
    }
    Err(Error::malformed(family, "unterminated value segment"))
}

/// Flip every bit, reversing the byte order of a prefix-free segment.
pub fn complement(bytes: &mut [u8]) {
    for byte in bytes.iter_mut() {
        *byte = !*byte;
    }
}
