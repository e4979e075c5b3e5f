//! Bosun Core — tree addressing, model values, and the management wire
//! protocol.
//!
//! This crate is transport-free: it defines the value and address types the
//! management layer moves around, and synchronous byte-level codecs for the
//! framing protocol. The server crate supplies sockets, the resource tree,
//! and the operation pipeline on top.

pub mod address;
pub mod value;
pub mod wire;

pub use address::{AddressParseError, PathAddress, PathElement, WILDCARD};
pub use value::{KindError, ModelValue, ValueKind, ValueMap};
pub use wire::{Frame, Outcome, ProtocolError, RequestMessage, ResponseMessage};
