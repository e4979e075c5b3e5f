//! Binary encoding of [`ModelValue`] payloads.
//!
//! A value is one kind tag byte followed by its body. Scalars are
//! big-endian; strings and byte sequences are u32-length-prefixed;
//! containers are u32-count-prefixed. The encoding is self-describing and
//! preserves object insertion order exactly.
//!
//! | tag  | kind      | body                                      |
//! |------|-----------|-------------------------------------------|
//! | 0x00 | undefined | none                                      |
//! | 0x01 | boolean   | one byte, `0` or `1`                      |
//! | 0x02 | integer   | 8-byte two's complement                   |
//! | 0x03 | decimal   | 8-byte IEEE-754 bit pattern               |
//! | 0x04 | string    | u32 byte length, UTF-8 bytes              |
//! | 0x05 | bytes     | u32 length, raw bytes                     |
//! | 0x06 | list      | u32 count, then each element              |
//! | 0x07 | object    | u32 count, then (string key, value) pairs |

use std::io::Cursor;

use crate::value::{ModelValue, ValueMap};

use super::error::ProtocolError;
use super::primitives::{
    length_u32, put_blob, put_string, put_u32, put_u64, read_blob, read_count, read_string,
    read_u64, read_u8,
};

const TAG_UNDEFINED: u8 = 0x00;
const TAG_BOOLEAN: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_DECIMAL: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_LIST: u8 = 0x06;
const TAG_OBJECT: u8 = 0x07;

/// Ceiling on any single string or byte field, in bytes.
pub const MAX_FIELD_BYTES: u32 = 1 << 20;

/// Ceiling on the item count of any single list or object.
pub const MAX_CONTAINER_ITEMS: u32 = 1 << 16;

/// Ceiling on container nesting depth.
pub const MAX_VALUE_DEPTH: u32 = 32;

/// Appends the wire form of `value`.
///
/// The encoder enforces the same field, count, and depth ceilings as the
/// decoder, so an encoded value is always acceptable to a peer.
///
/// # Errors
///
/// [`ProtocolError::TooLarge`] or [`ProtocolError::TooDeep`] when the value
/// exceeds a ceiling.
pub fn encode_value(value: &ModelValue, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
    encode_value_at(value, buf, 0)
}

fn encode_value_at(
    value: &ModelValue,
    buf: &mut Vec<u8>,
    depth: u32,
) -> Result<(), ProtocolError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ProtocolError::TooDeep(MAX_VALUE_DEPTH));
    }
    match value {
        ModelValue::Undefined => buf.push(TAG_UNDEFINED),
        ModelValue::Boolean(b) => {
            buf.push(TAG_BOOLEAN);
            buf.push(u8::from(*b));
        }
        ModelValue::Integer(i) => {
            buf.push(TAG_INTEGER);
            #[allow(clippy::cast_sign_loss)]
            put_u64(buf, *i as u64);
        }
        ModelValue::Decimal(d) => {
            buf.push(TAG_DECIMAL);
            put_u64(buf, d.to_bits());
        }
        ModelValue::String(s) => {
            buf.push(TAG_STRING);
            put_string(buf, s, MAX_FIELD_BYTES)?;
        }
        ModelValue::Bytes(bytes) => {
            buf.push(TAG_BYTES);
            put_blob(buf, bytes, MAX_FIELD_BYTES)?;
        }
        ModelValue::List(items) => {
            buf.push(TAG_LIST);
            put_u32(buf, length_u32(items.len(), MAX_CONTAINER_ITEMS)?);
            for item in items {
                encode_value_at(item, buf, depth + 1)?;
            }
        }
        ModelValue::Object(map) => {
            buf.push(TAG_OBJECT);
            put_u32(buf, length_u32(map.len(), MAX_CONTAINER_ITEMS)?);
            for (key, item) in map.iter() {
                put_string(buf, key, MAX_FIELD_BYTES)?;
                encode_value_at(item, buf, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Reads one value from the cursor.
///
/// # Errors
///
/// [`ProtocolError::Truncated`] when the buffer ends inside the value, and
/// the malformed-payload variants on bad tags, bad UTF-8, repeated object
/// keys, or exceeded ceilings.
pub fn decode_value(cursor: &mut Cursor<&[u8]>) -> Result<ModelValue, ProtocolError> {
    decode_value_at(cursor, 0)
}

fn decode_value_at(
    cursor: &mut Cursor<&[u8]>,
    depth: u32,
) -> Result<ModelValue, ProtocolError> {
    if depth > MAX_VALUE_DEPTH {
        return Err(ProtocolError::TooDeep(MAX_VALUE_DEPTH));
    }
    match read_u8(cursor)? {
        TAG_UNDEFINED => Ok(ModelValue::Undefined),
        TAG_BOOLEAN => Ok(ModelValue::Boolean(read_u8(cursor)? != 0)),
        TAG_INTEGER => {
            #[allow(clippy::cast_possible_wrap)]
            Ok(ModelValue::Integer(read_u64(cursor)? as i64))
        }
        TAG_DECIMAL => Ok(ModelValue::Decimal(f64::from_bits(read_u64(cursor)?))),
        TAG_STRING => Ok(ModelValue::String(read_string(cursor, MAX_FIELD_BYTES)?)),
        TAG_BYTES => Ok(ModelValue::Bytes(read_blob(cursor, MAX_FIELD_BYTES)?)),
        TAG_LIST => {
            let count = read_count(cursor, MAX_CONTAINER_ITEMS)?;
            let mut items = Vec::new();
            for _ in 0..count {
                items.push(decode_value_at(cursor, depth + 1)?);
            }
            Ok(ModelValue::List(items))
        }
        TAG_OBJECT => {
            let count = read_count(cursor, MAX_CONTAINER_ITEMS)?;
            let mut map = ValueMap::new();
            for _ in 0..count {
                let key = read_string(cursor, MAX_FIELD_BYTES)?;
                if map.contains_key(&key) {
                    return Err(ProtocolError::DuplicateKey(key));
                }
                let item = decode_value_at(cursor, depth + 1)?;
                map.insert(key, item);
            }
            Ok(ModelValue::Object(map))
        }
        other => Err(ProtocolError::UnknownValueTag(other)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
