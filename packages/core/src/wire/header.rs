//! The fixed-layout management frame header.
//!
//! Every frame opens with the same eleven bytes: a four-byte signature, a
//! guarded protocol version, and a guarded message type code. The signature
//! is checked before any other field is trusted, and a reserved sentinel in
//! the first byte announces a graceful disconnect instead of a frame.

use std::io::Cursor;

use super::error::ProtocolError;
use super::primitives::{expect_marker, read_u32, read_u8};

/// Four-byte preamble opening every management frame.
pub const SIGNATURE: [u8; 4] = *b"BOSN";

/// Reserved first byte announcing a graceful disconnect instead of a frame.
pub const GOODBYE: u8 = 0xFF;

/// Guard byte preceding the protocol version field.
pub const VERSION_MARKER: u8 = 0x56;

/// Guard byte preceding the message type code.
pub const TYPE_MARKER: u8 = 0x54;

/// Wire code for a request frame.
pub const TYPE_REQUEST: u8 = 0x01;

/// Wire code for a response frame.
pub const TYPE_RESPONSE: u8 = 0x02;

/// Protocol version this library speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Byte length of the fixed header.
pub const HEADER_LEN: usize = 11;

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Classification of the payload following the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// An operation request.
    Request,
    /// An operation response.
    Response,
}

impl MessageType {
    /// The wire code of this type.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Request => TYPE_REQUEST,
            Self::Response => TYPE_RESPONSE,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            TYPE_REQUEST => Ok(Self::Request),
            TYPE_RESPONSE => Ok(Self::Response),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// ManagementHeader
// ---------------------------------------------------------------------------

/// The decoded fixed header: protocol version plus message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagementHeader {
    /// Protocol version the sender speaks.
    pub version: u32,
    /// What follows the header.
    pub message_type: MessageType,
}

/// Outcome of reading the front of a frame: either a header, after which
/// type-specific fields follow, or the goodbye sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStart {
    /// A frame follows.
    Header(ManagementHeader),
    /// The peer is disconnecting gracefully; nothing follows.
    Goodbye,
}

impl ManagementHeader {
    /// Builds a header for the current protocol version.
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type,
        }
    }

    /// Appends the header bytes: signature, version marker, version, type
    /// marker, type code, in that exact order.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&SIGNATURE);
        buf.push(VERSION_MARKER);
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.push(TYPE_MARKER);
        buf.push(self.message_type.code());
    }

    /// Reads the front of a frame.
    ///
    /// The first byte is inspected alone: the sentinel yields
    /// [`HeaderStart::Goodbye`] without touching anything after it. Only
    /// then are the remaining signature bytes read and compared, the
    /// version field validated against its marker, and the type code
    /// resolved.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] when the buffer holds less than a full
    /// header, and the malformed-header variants on any mismatched byte.
    pub fn decode(cursor: &mut Cursor<&[u8]>) -> Result<HeaderStart, ProtocolError> {
        let first = read_u8(cursor)?;
        if first == GOODBYE {
            return Ok(HeaderStart::Goodbye);
        }
        let mut found = [first, 0, 0, 0];
        for slot in &mut found[1..] {
            *slot = read_u8(cursor)?;
        }
        if found != SIGNATURE {
            return Err(ProtocolError::BadSignature { found });
        }
        expect_marker(cursor, VERSION_MARKER)?;
        let version = read_u32(cursor)?;
        expect_marker(cursor, TYPE_MARKER)?;
        let message_type = MessageType::try_from(read_u8(cursor)?)?;
        Ok(HeaderStart::Header(Self {
            version,
            message_type,
        }))
    }
}

/// The protocol version two endpoints operate at: the smaller of the two
/// advertised versions.
#[must_use]
pub fn negotiate(local: u32, remote: u32) -> u32 {
    if local != remote {
        tracing::debug!(local, remote, "management protocol version downgrade");
    }
    local.min(remote)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
