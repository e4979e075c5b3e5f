//! The management wire protocol: framing, header, and payload codecs.
//!
//! Every frame shares one fixed layout: signature, guarded version,
//! guarded type code, type-specific fields, then the model-value payload.
//! A reserved first byte turns the frame into a graceful goodbye instead.
//! [`Frame`] is the decode result; the codecs here are synchronous and
//! buffer-based, leaving transport integration to the caller.

pub mod error;
pub mod header;
pub mod messages;
pub mod payload;

mod primitives;

pub use error::ProtocolError;
pub use header::{
    negotiate, HeaderStart, ManagementHeader, MessageType, GOODBYE, HEADER_LEN,
    PROTOCOL_VERSION, SIGNATURE, TYPE_MARKER, TYPE_REQUEST, TYPE_RESPONSE, VERSION_MARKER,
};
pub use messages::{
    Frame, Outcome, RequestMessage, ResponseMessage, OUTCOME_FAILED, OUTCOME_SUCCESS,
};
pub use payload::{
    decode_value, encode_value, MAX_CONTAINER_ITEMS, MAX_FIELD_BYTES, MAX_VALUE_DEPTH,
};
