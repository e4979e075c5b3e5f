//! Byte-level read and write helpers shared by the wire codecs.
//!
//! Reads operate on a cursor over an in-memory buffer; running out of bytes
//! is always [`ProtocolError::Truncated`]. All scalars are big-endian.

use std::io::{Cursor, Read};

use super::error::ProtocolError;

pub(super) fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    let mut byte = [0_u8; 1];
    cursor
        .read_exact(&mut byte)
        .map_err(|_| ProtocolError::Truncated)?;
    Ok(byte[0])
}

pub(super) fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, ProtocolError> {
    let mut bytes = [0_u8; 4];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| ProtocolError::Truncated)?;
    Ok(u32::from_be_bytes(bytes))
}

pub(super) fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, ProtocolError> {
    let mut bytes = [0_u8; 8];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| ProtocolError::Truncated)?;
    Ok(u64::from_be_bytes(bytes))
}

/// Reads a length-prefixed byte blob, rejecting declared lengths above
/// `limit` before any allocation happens.
pub(super) fn read_blob(
    cursor: &mut Cursor<&[u8]>,
    limit: u32,
) -> Result<Vec<u8>, ProtocolError> {
    let declared = read_u32(cursor)?;
    if declared > limit {
        return Err(ProtocolError::TooLarge { declared, limit });
    }
    let mut blob = vec![0_u8; declared as usize];
    cursor
        .read_exact(&mut blob)
        .map_err(|_| ProtocolError::Truncated)?;
    Ok(blob)
}

/// Reads a length-prefixed UTF-8 string.
pub(super) fn read_string(
    cursor: &mut Cursor<&[u8]>,
    limit: u32,
) -> Result<String, ProtocolError> {
    let blob = read_blob(cursor, limit)?;
    String::from_utf8(blob).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Reads a container item count, rejecting counts above `limit`.
pub(super) fn read_count(
    cursor: &mut Cursor<&[u8]>,
    limit: u32,
) -> Result<u32, ProtocolError> {
    let declared = read_u32(cursor)?;
    if declared > limit {
        return Err(ProtocolError::TooLarge { declared, limit });
    }
    Ok(declared)
}

/// Validates that the next byte equals an expected field marker.
pub(super) fn expect_marker(
    cursor: &mut Cursor<&[u8]>,
    expected: u8,
) -> Result<(), ProtocolError> {
    let found = read_u8(cursor)?;
    if found == expected {
        Ok(())
    } else {
        Err(ProtocolError::BadFieldMarker { expected, found })
    }
}

pub(super) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(super) fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Writes a length-prefixed byte blob, enforcing the same ceiling the
/// decoder applies so a produced frame is always parseable by a peer.
pub(super) fn put_blob(buf: &mut Vec<u8>, blob: &[u8], limit: u32) -> Result<(), ProtocolError> {
    let declared = length_u32(blob.len(), limit)?;
    put_u32(buf, declared);
    buf.extend_from_slice(blob);
    Ok(())
}

pub(super) fn put_string(buf: &mut Vec<u8>, s: &str, limit: u32) -> Result<(), ProtocolError> {
    put_blob(buf, s.as_bytes(), limit)
}

/// Converts a host-side length into the wire's u32 form, rejecting values
/// above `limit`.
pub(super) fn length_u32(len: usize, limit: u32) -> Result<u32, ProtocolError> {
    let declared = u32::try_from(len).map_err(|_| ProtocolError::TooLarge {
        declared: u32::MAX,
        limit,
    })?;
    if declared > limit {
        return Err(ProtocolError::TooLarge { declared, limit });
    }
    Ok(declared)
}
