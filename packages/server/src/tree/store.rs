//! The committed configuration tree.

use bosun_core::{ModelValue, PathAddress};
use parking_lot::RwLock;

use super::error::TreeError;
use super::locks::ScopeTable;
use super::resource::Resource;
use super::transaction::Transaction;

/// The durable tree of managed resources.
///
/// All mutation goes through a [`Transaction`]; the methods here expose the
/// last committed state only. Committed reads never block behind an open
/// transaction, they see the tree as of the most recent commit.
#[derive(Debug, Default)]
pub struct ResourceTree {
    root: RwLock<Resource>,
    scopes: ScopeTable,
}

impl ResourceTree {
    /// An empty tree: a single root resource with an undefined model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `read` against the committed root.
    pub fn read<R>(&self, read: impl FnOnce(&Resource) -> R) -> R {
        read(&self.root.read())
    }

    /// Clones the attribute model at `address` out of committed state.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve.
    pub fn lookup(&self, address: &PathAddress) -> Result<ModelValue, TreeError> {
        let root = self.root.read();
        root.descendant(address)
            .map(|node| node.model().clone())
            .ok_or_else(|| TreeError::ResourceNotFound(address.clone()))
    }

    /// Resolves a possibly-wildcard `address` against committed state,
    /// cloning each matched subtree. Matches come out in structural order.
    #[must_use]
    pub fn query(&self, address: &PathAddress) -> Vec<(PathAddress, Resource)> {
        let root = self.root.read();
        resolve_matches(&root, address)
            .into_iter()
            .map(|(found, node)| (found, node.clone()))
            .collect()
    }

    /// Opens a transaction.
    ///
    /// With a scope root the call blocks until no other live transaction
    /// holds an overlapping write scope, then snapshots the committed tree.
    /// Without one the transaction starts read-only; the first staged write
    /// will try to extend the (empty) scope and fail under contention.
    pub fn begin(&self, scope_root: Option<PathAddress>) -> Transaction<'_> {
        let scope = match scope_root {
            Some(prefix) => self.scopes.acquire(prefix),
            None => self.scopes.empty_scope(),
        };
        // Snapshot after the scope is held: nothing can commit under the
        // held prefix between these two lines.
        let working = self.root.read().clone();
        Transaction::new(self, working, scope)
    }

    /// Replaces each scoped prefix of the committed tree with the state of
    /// the transaction's working copy. Called with the write scope held.
    pub(super) fn commit_graft(&self, prefixes: &[PathAddress], working: &Resource) {
        let mut root = self.root.write();
        for prefix in prefixes {
            graft_at(&mut root, working, prefix);
        }
    }
}

/// Splices the working copy's subtree at `prefix` into the committed tree.
fn graft_at(committed: &mut Resource, working: &Resource, prefix: &PathAddress) {
    let Some(last) = prefix.last() else {
        *committed = working.clone();
        return;
    };
    let parent = prefix.parent().unwrap_or_else(PathAddress::root);
    let Some(target) = committed.descendant_mut(&parent) else {
        // Scope exclusion keeps every ancestor of a held prefix alive, so
        // a vanished parent means the scope rules were bypassed.
        debug_assert!(false, "graft parent vanished from the committed tree");
        tracing::warn!(prefix = %prefix, "skipping graft, parent no longer exists");
        return;
    };
    match working.descendant(prefix) {
        Some(subtree) => {
            target.insert_child(last.clone(), subtree.clone());
        }
        None => {
            target.remove_child(last);
        }
    }
}

/// Walks `address` expanding wildcard segments against each node's children.
pub(super) fn resolve_matches<'r>(
    root: &'r Resource,
    address: &PathAddress,
) -> Vec<(PathAddress, &'r Resource)> {
    let mut frontier: Vec<(PathAddress, &Resource)> = vec![(PathAddress::root(), root)];
    for element in address {
        let mut next = Vec::new();
        for (found, node) in frontier {
            if element.is_wildcard() {
                for (child_element, child) in node.children() {
                    if element.matches(child_element) {
                        next.push((found.child(child_element.clone()), child));
                    }
                }
            } else if let Some(child) = node.child(element) {
                next.push((found.child(element.clone()), child));
            }
        }
        frontier = next;
    }
    frontier
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
