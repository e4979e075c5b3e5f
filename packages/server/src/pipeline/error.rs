//! Operation failure taxonomy.

use bosun_core::{KindError, ModelValue, PathAddress};
use thiserror::Error;

use crate::tree::TreeError;

/// Why an invocation rolled back.
///
/// Tree failures pass through unchanged so callers can distinguish, say, a
/// missing resource from a duplicate one. Everything else is a
/// pipeline-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// A staged tree mutation or lookup failed.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// An attribute value had the wrong kind for the requested change.
    #[error("model value error: {0}")]
    Value(#[from] KindError),

    /// The operation is not valid in the server's current lifecycle state.
    #[error("illegal operation state: {0}")]
    IllegalState(String),

    /// No handler is registered under the requested name.
    #[error("no handler registered for operation `{name}` at {address}")]
    UnknownOperation {
        /// The unresolved operation name.
        name: String,
        /// The request's target address.
        address: PathAddress,
    },

    /// A parameter the handler requires was absent or of the wrong kind.
    #[error("required parameter `{0}` is missing")]
    MissingParameter(String),

    /// Handler-reported failure carrying its own detail value.
    #[error("operation failed: {0}")]
    Failed(ModelValue),
}

impl OperationError {
    /// The failure-detail value reported back to callers.
    #[must_use]
    pub fn to_detail(&self) -> ModelValue {
        match self {
            Self::Failed(detail) => detail.clone(),
            other => ModelValue::from(other.to_string()),
        }
    }
}
