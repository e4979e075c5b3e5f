//! Protocol error taxonomy.

use thiserror::Error;

/// Reasons a byte stream fails to parse as a management frame.
///
/// A graceful peer disconnect is not represented here: the decoder returns
/// it as [`crate::wire::Frame::Goodbye`], so a clean goodbye can never be
/// mistaken for a corrupt stream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer ended before a full frame was available. An incremental
    /// decoder treats this as "wait for more bytes", not as corruption.
    #[error("truncated frame")]
    Truncated,
    /// The four-byte signature did not match the protocol constant.
    #[error("bad protocol signature {found:02x?}")]
    BadSignature {
        /// The four bytes actually read.
        found: [u8; 4],
    },
    /// A field-marker guard byte did not match its expected constant.
    #[error("bad field marker: expected {expected:#04x}, found {found:#04x}")]
    BadFieldMarker {
        /// Marker the layout requires at this position.
        expected: u8,
        /// Byte actually read.
        found: u8,
    },
    /// The header type code named neither a request nor a response.
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),
    /// A value payload carried an unknown kind tag.
    #[error("unknown value tag {0:#04x}")]
    UnknownValueTag(u8),
    /// A response carried an unknown outcome code.
    #[error("unknown outcome code {0:#04x}")]
    UnknownOutcome(u8),
    /// A string field was not valid UTF-8.
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
    /// A declared length or count exceeded the hostile-input ceiling for
    /// its field class.
    #[error("declared length {declared} exceeds the limit of {limit}")]
    TooLarge {
        /// Length or count the frame declared.
        declared: u32,
        /// Ceiling for this field class.
        limit: u32,
    },
    /// Value nesting exceeded the depth ceiling.
    #[error("value nesting exceeds the depth limit of {0}")]
    TooDeep(u32),
    /// An object payload repeated a key.
    #[error("duplicate object key `{0}`")]
    DuplicateKey(String),
}

impl ProtocolError {
    /// Whether more input could turn this failure into a successful parse.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Truncated)
    }
}
