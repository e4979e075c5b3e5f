//! The managed resource tree.
//!
//! Committed state lives in [`ResourceTree`]; every mutation is staged on a
//! [`Transaction`]'s private working copy and grafted back atomically at
//! commit. Write exclusion is per address prefix: concurrent operations may
//! work disjoint subtrees, never overlapping ones.

pub mod error;
pub mod locks;
pub mod resource;
pub mod store;
pub mod transaction;

pub use error::TreeError;
pub use locks::{ScopeTable, WriteScope};
pub use resource::Resource;
pub use store::ResourceTree;
pub use transaction::Transaction;
