//! Framed transport codec for the management protocol.

use bosun_core::{Frame, ProtocolError};
use bytes::{Buf, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Ceiling on the byte size of a single inbound frame.
///
/// The per-field payload ceilings do not bound a whole frame; this does.
/// Generous for management traffic, small enough that one connection
/// cannot balloon the read buffer while a frame trickles in.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024; // 16 MiB

/// Transport-level failure of a framed management stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer sent bytes that do not form a valid frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// A single frame grew past the configured ceiling before completing.
    #[error("frame exceeds the {limit}-byte ceiling ({buffered} bytes buffered)")]
    FrameTooLarge {
        /// Bytes buffered for the frame so far.
        buffered: usize,
        /// Configured ceiling.
        limit: usize,
    },
    /// The underlying socket failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stream codec over [`Frame`]'s wire form.
///
/// Frames have no length prefix, so the decoder re-parses from the front
/// of the buffer: an incomplete frame reads as "need more", anything
/// malformed fails the stream. Only truncation is curable by more input,
/// and only until the buffered frame outgrows `max_frame_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct ManagementCodec {
    max_frame_bytes: usize,
}

impl ManagementCodec {
    /// Creates a codec that fails the stream once a single incomplete
    /// frame exceeds `max_frame_bytes`.
    #[must_use]
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

impl Default for ManagementCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for ManagementCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        if src.is_empty() {
            return Ok(None);
        }
        match Frame::decode(src.as_ref()) {
            Ok((frame, consumed)) => {
                src.advance(consumed);
                Ok(Some(frame))
            }
            Err(error) if error.is_incomplete() => {
                if src.len() > self.max_frame_bytes {
                    return Err(CodecError::FrameTooLarge {
                        buffered: src.len(),
                        limit: self.max_frame_bytes,
                    });
                }
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl Encoder<Frame> for ManagementCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let mut buf = Vec::new();
        frame.encode(&mut buf)?;
        dst.extend_from_slice(&buf);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
