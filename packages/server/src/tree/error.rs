//! Tree addressing and shape failures.

use bosun_core::PathAddress;
use thiserror::Error;

/// Violations of the tree's addressing, shape, and write-exclusion rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// A segment of the address does not resolve to a resource.
    #[error("no resource at {0}")]
    ResourceNotFound(PathAddress),

    /// The target address already holds a resource.
    #[error("a resource already exists at {0}")]
    DuplicateResource(PathAddress),

    /// Non-recursive removal reached a node that still has children.
    #[error("resource at {0} still has children")]
    ResourceHasChildren(PathAddress),

    /// A wildcard address was used where a single concrete resource is
    /// required. Wildcards are valid for reads only.
    #[error("wildcard address {0} cannot be modified")]
    WildcardMutation(PathAddress),

    /// The root resource is permanent and cannot be removed.
    #[error("the root resource cannot be removed")]
    RootRemoval,

    /// The operation's write scope could not be extended to cover the
    /// target address mid-flight.
    #[error("cannot extend the write scope to {0} mid-operation")]
    ScopeConflict(PathAddress),
}
