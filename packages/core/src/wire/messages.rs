//! Request and response envelopes and the whole-frame codec.
//!
//! A frame is the fixed header, the type-specific fields, then the model
//! value payload. Requests carry a correlation id, the operation name, the
//! target address, and the parameter value; responses echo the correlation
//! id and carry an outcome code with a result or failure-detail value. The
//! goodbye sentinel is a complete one-byte frame of its own.

use std::io::Cursor;

use crate::address::{PathAddress, PathElement};
use crate::value::ModelValue;

use super::error::ProtocolError;
use super::header::{HeaderStart, ManagementHeader, MessageType, GOODBYE, PROTOCOL_VERSION};
use super::payload::{decode_value, encode_value, MAX_CONTAINER_ITEMS, MAX_FIELD_BYTES};
use super::primitives::{
    length_u32, put_string, put_u32, read_count, read_string, read_u32, read_u8,
};

/// Wire code for a successful outcome.
pub const OUTCOME_SUCCESS: u8 = 0x01;

/// Wire code for a failed outcome.
pub const OUTCOME_FAILED: u8 = 0x02;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Whether the operation an invocation asked for committed or rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation committed; the body is its result.
    Success,
    /// The operation rolled back; the body is the failure detail.
    Failed,
}

impl Outcome {
    /// The wire code of this outcome.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => OUTCOME_SUCCESS,
            Self::Failed => OUTCOME_FAILED,
        }
    }
}

impl TryFrom<u8> for Outcome {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            OUTCOME_SUCCESS => Ok(Self::Success),
            OUTCOME_FAILED => Ok(Self::Failed),
            other => Err(ProtocolError::UnknownOutcome(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestMessage
// ---------------------------------------------------------------------------

/// An operation request. Fields are listed in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    /// Protocol version the sender speaks.
    pub version: u32,
    /// Caller-chosen id echoed by the matching response.
    pub correlation_id: u32,
    /// Registered operation name, e.g. `read-resource`.
    pub operation: String,
    /// Target node in the configuration tree.
    pub address: PathAddress,
    /// Operation parameters.
    pub params: ModelValue,
}

impl RequestMessage {
    /// Builds a request at the current protocol version.
    pub fn new(
        correlation_id: u32,
        operation: impl Into<String>,
        address: PathAddress,
        params: ModelValue,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            correlation_id,
            operation: operation.into(),
            address,
            params,
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseMessage
// ---------------------------------------------------------------------------

/// An operation response. Fields are listed in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    /// Protocol version the sender speaks.
    pub version: u32,
    /// Correlation id of the request this answers.
    pub correlation_id: u32,
    /// Success or failure.
    pub outcome: Outcome,
    /// Result on success, failure detail on failure.
    pub body: ModelValue,
}

impl ResponseMessage {
    /// Builds a success response carrying `result`.
    #[must_use]
    pub fn success(correlation_id: u32, result: ModelValue) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            correlation_id,
            outcome: Outcome::Success,
            body: result,
        }
    }

    /// Builds a failure response carrying `detail`.
    #[must_use]
    pub fn failure(correlation_id: u32, detail: ModelValue) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            correlation_id,
            outcome: Outcome::Failed,
            body: detail,
        }
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One decoded unit of the management stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An operation request.
    Request(RequestMessage),
    /// An operation response.
    Response(ResponseMessage),
    /// The peer ended the connection gracefully.
    Goodbye,
}

impl Frame {
    /// Appends this frame's wire bytes.
    ///
    /// # Errors
    ///
    /// The payload ceilings of [`super::payload`] apply; an operation name,
    /// address segment, or value exceeding them is refused.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        match self {
            Self::Goodbye => {
                buf.push(GOODBYE);
                Ok(())
            }
            Self::Request(request) => {
                ManagementHeader {
                    version: request.version,
                    message_type: MessageType::Request,
                }
                .encode(buf);
                put_u32(buf, request.correlation_id);
                put_string(buf, &request.operation, MAX_FIELD_BYTES)?;
                put_u32(buf, length_u32(request.address.len(), MAX_CONTAINER_ITEMS)?);
                for element in &request.address {
                    put_string(buf, element.key(), MAX_FIELD_BYTES)?;
                    put_string(buf, element.value(), MAX_FIELD_BYTES)?;
                }
                encode_value(&request.params, buf)
            }
            Self::Response(response) => {
                ManagementHeader {
                    version: response.version,
                    message_type: MessageType::Response,
                }
                .encode(buf);
                put_u32(buf, response.correlation_id);
                buf.push(response.outcome.code());
                encode_value(&response.body, buf)
            }
        }
    }

    /// Attempts to decode one frame from the front of `buf`, returning the
    /// frame together with the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] when `buf` holds less than one full
    /// frame; the malformed-frame variants otherwise. Truncation is the
    /// only error more input can cure.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let mut cursor = Cursor::new(buf);
        let frame = match ManagementHeader::decode(&mut cursor)? {
            HeaderStart::Goodbye => Self::Goodbye,
            HeaderStart::Header(header) => match header.message_type {
                MessageType::Request => {
                    let correlation_id = read_u32(&mut cursor)?;
                    let operation = read_string(&mut cursor, MAX_FIELD_BYTES)?;
                    let segments = read_count(&mut cursor, MAX_CONTAINER_ITEMS)?;
                    let mut elements = Vec::new();
                    for _ in 0..segments {
                        let key = read_string(&mut cursor, MAX_FIELD_BYTES)?;
                        let value = read_string(&mut cursor, MAX_FIELD_BYTES)?;
                        elements.push(PathElement::new(key, value));
                    }
                    let params = decode_value(&mut cursor)?;
                    Self::Request(RequestMessage {
                        version: header.version,
                        correlation_id,
                        operation,
                        address: PathAddress::new(elements),
                        params,
                    })
                }
                MessageType::Response => {
                    let correlation_id = read_u32(&mut cursor)?;
                    let outcome = Outcome::try_from(read_u8(&mut cursor)?)?;
                    let body = decode_value(&mut cursor)?;
                    Self::Response(ResponseMessage {
                        version: header.version,
                        correlation_id,
                        outcome,
                        body,
                    })
                }
            },
        };
        // A cursor over a slice can never pass the slice's length.
        #[allow(clippy::cast_possible_truncation)]
        let consumed = cursor.position() as usize;
        Ok((frame, consumed))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
