//! All-or-nothing mutation of the resource tree.

use bosun_core::{ModelValue, PathAddress};

use super::error::TreeError;
use super::locks::WriteScope;
use super::resource::Resource;
use super::store::{resolve_matches, ResourceTree};

/// A private working copy of the tree plus the write scope guarding it.
///
/// Every staged change lands in the working copy; committed state is
/// untouched until [`Transaction::commit`] grafts the scoped subtrees back
/// in one write-locked pass. Dropping the transaction without committing
/// rolls everything back.
///
/// Writes are only accepted under the transaction's write scope. Writing
/// outside it extends the scope on the fly; the extension fails rather than
/// blocks when another live transaction holds an overlapping prefix.
#[derive(Debug)]
pub struct Transaction<'t> {
    tree: &'t ResourceTree,
    working: Resource,
    scope: WriteScope<'t>,
}

impl<'t> Transaction<'t> {
    pub(super) fn new(tree: &'t ResourceTree, working: Resource, scope: WriteScope<'t>) -> Self {
        Self {
            tree,
            working,
            scope,
        }
    }

    // -- Reads --------------------------------------------------------------

    /// The resource at `address` in the working copy.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve.
    pub fn resource(&self, address: &PathAddress) -> Result<&Resource, TreeError> {
        self.working
            .descendant(address)
            .ok_or_else(|| TreeError::ResourceNotFound(address.clone()))
    }

    /// The attribute model at `address` in the working copy.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve.
    pub fn read_model(&self, address: &PathAddress) -> Result<&ModelValue, TreeError> {
        self.resource(address).map(Resource::model)
    }

    /// Resolves a possibly-wildcard `address` against the working copy.
    /// Matches come out in structural order.
    #[must_use]
    pub fn query(&self, address: &PathAddress) -> Vec<(PathAddress, &Resource)> {
        resolve_matches(&self.working, address)
    }

    // -- Writes -------------------------------------------------------------

    /// The attribute model at `address`, writable. Changes stay private to
    /// this transaction until commit.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve,
    /// plus the scope and wildcard failures of any write.
    pub fn read_model_for_update(
        &mut self,
        address: &PathAddress,
    ) -> Result<&mut ModelValue, TreeError> {
        self.ensure_writable(address)?;
        self.working
            .descendant_mut(address)
            .map(Resource::model_mut)
            .ok_or_else(|| TreeError::ResourceNotFound(address.clone()))
    }

    /// Stages a new resource at `address` with `model` as its attributes.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the parent does not resolve and
    /// [`TreeError::DuplicateResource`] when the address is already taken,
    /// plus the scope and wildcard failures of any write.
    pub fn create_resource(
        &mut self,
        address: &PathAddress,
        model: ModelValue,
    ) -> Result<(), TreeError> {
        self.ensure_writable(address)?;
        let Some(last) = address.last() else {
            // The root always exists.
            return Err(TreeError::DuplicateResource(address.clone()));
        };
        let parent = address.parent().unwrap_or_else(PathAddress::root);
        let Some(node) = self.working.descendant_mut(&parent) else {
            return Err(TreeError::ResourceNotFound(parent));
        };
        if node.has_child(last) {
            return Err(TreeError::DuplicateResource(address.clone()));
        }
        node.insert_child(last.clone(), Resource::new(model));
        Ok(())
    }

    /// Stages removal of the resource at `address`.
    ///
    /// # Errors
    /// [`TreeError::ResourceNotFound`] when the address does not resolve,
    /// [`TreeError::ResourceHasChildren`] when the node has children and
    /// `recursive` is off, and [`TreeError::RootRemoval`] for the root,
    /// plus the scope and wildcard failures of any write.
    pub fn remove_resource(
        &mut self,
        address: &PathAddress,
        recursive: bool,
    ) -> Result<(), TreeError> {
        self.ensure_writable(address)?;
        let Some(last) = address.last() else {
            return Err(TreeError::RootRemoval);
        };
        let parent = address.parent().unwrap_or_else(PathAddress::root);
        let Some(node) = self.working.descendant_mut(&parent) else {
            return Err(TreeError::ResourceNotFound(address.clone()));
        };
        let Some(target) = node.child(last) else {
            return Err(TreeError::ResourceNotFound(address.clone()));
        };
        if target.has_children() && !recursive {
            return Err(TreeError::ResourceHasChildren(address.clone()));
        }
        node.remove_child(last);
        Ok(())
    }

    // -- Completion ---------------------------------------------------------

    /// Makes every staged change durable in one atomic pass.
    pub fn commit(self) {
        self.tree.commit_graft(self.scope.prefixes(), &self.working);
    }

    /// Discards every staged change and releases the write scope.
    /// Dropping the transaction without committing does the same.
    pub fn rollback(self) {}

    // -- Internals ----------------------------------------------------------

    fn ensure_writable(&mut self, address: &PathAddress) -> Result<(), TreeError> {
        if address.is_multi_target() {
            return Err(TreeError::WildcardMutation(address.clone()));
        }
        if self.scope.covers(address) {
            return Ok(());
        }
        if !self.scope.try_extend(address) {
            return Err(TreeError::ScopeConflict(address.clone()));
        }
        self.refresh_from_committed(address);
        Ok(())
    }

    /// Re-copies committed state under a freshly extended prefix into the
    /// working copy. The snapshot taken at begin may predate commits there.
    ///
    /// Until this call, writes under the prefix were impossible, so the
    /// splice cannot clobber staged changes.
    fn refresh_from_committed(&mut self, address: &PathAddress) {
        // Splice at the first segment missing from the working copy, or at
        // the target itself when the whole chain is present.
        let mut splice = address.clone();
        let mut walked = PathAddress::root();
        for element in address {
            let next = walked.child(element.clone());
            if self.working.descendant(&next).is_none() {
                splice = next;
                break;
            }
            walked = next;
        }

        let committed = self.tree.read(|root| root.descendant(&splice).cloned());
        let Some(last) = splice.last() else {
            // Extending to the root is only possible from an empty scope,
            // and an empty scope means nothing was staged yet.
            if let Some(fresh_root) = committed {
                self.working = fresh_root;
            }
            return;
        };
        let parent = splice.parent().unwrap_or_else(PathAddress::root);
        if let Some(node) = self.working.descendant_mut(&parent) {
            match committed {
                Some(subtree) => {
                    node.insert_child(last.clone(), subtree);
                }
                None => {
                    node.remove_child(last);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn address(text: &str) -> PathAddress {
        text.parse().unwrap()
    }

    fn named(name: &str) -> ModelValue {
        let mut model = ModelValue::object();
        model.set("name", name).unwrap();
        model
    }

    fn seeded() -> ResourceTree {
        let tree = ResourceTree::new();
        {
            let mut txn = tree.begin(Some(PathAddress::root()));
            txn.create_resource(&address("/host=a"), named("a")).unwrap();
            txn.create_resource(&address("/host=a/server=web"), named("web"))
                .unwrap();
            txn.create_resource(&address("/host=b"), named("b")).unwrap();
            txn.commit();
        }
        tree
    }

    // ---- Staging and atomicity ----

    #[test]
    fn staged_changes_stay_private_until_commit() {
        let tree = seeded();
        let target = address("/host=a");

        let mut txn = tree.begin(Some(target.clone()));
        txn.read_model_for_update(&target)
            .unwrap()
            .set("name", "renamed")
            .unwrap();

        // The transaction sees its own write.
        assert_eq!(
            txn.read_model(&target).unwrap().get("name"),
            Some(&ModelValue::from("renamed"))
        );
        // Committed state does not.
        assert_eq!(
            tree.lookup(&target).unwrap().get("name"),
            Some(&ModelValue::from("a"))
        );

        txn.commit();
        assert_eq!(
            tree.lookup(&target).unwrap().get("name"),
            Some(&ModelValue::from("renamed"))
        );
    }

    #[test]
    fn rollback_discards_every_staged_change() {
        let tree = seeded();
        let mut txn = tree.begin(Some(address("/host=a")));
        txn.create_resource(&address("/host=a/server=worker"), named("worker"))
            .unwrap();
        txn.remove_resource(&address("/host=a/server=web"), false)
            .unwrap();
        txn.rollback();

        assert!(tree.lookup(&address("/host=a/server=web")).is_ok());
        assert!(tree.lookup(&address("/host=a/server=worker")).is_err());
    }

    #[test]
    fn commit_applies_all_staged_changes_together() {
        let tree = seeded();
        let mut txn = tree.begin(Some(address("/host=a")));
        txn.create_resource(&address("/host=a/server=worker"), named("worker"))
            .unwrap();
        txn.remove_resource(&address("/host=a/server=web"), false)
            .unwrap();
        txn.commit();

        assert!(tree.lookup(&address("/host=a/server=worker")).is_ok());
        assert!(tree.lookup(&address("/host=a/server=web")).is_err());
    }

    #[test]
    fn dropping_a_transaction_rolls_back() {
        let tree = seeded();
        {
            let mut txn = tree.begin(Some(address("/host=b")));
            txn.read_model_for_update(&address("/host=b"))
                .unwrap()
                .set("name", "lost")
                .unwrap();
        }
        assert_eq!(
            tree.lookup(&address("/host=b")).unwrap().get("name"),
            Some(&ModelValue::from("b"))
        );
    }

    // ---- Structural errors ----

    #[test]
    fn create_rejects_duplicates_and_missing_parents() {
        let tree = seeded();
        let mut txn = tree.begin(Some(PathAddress::root()));

        assert_eq!(
            txn.create_resource(&address("/host=a"), named("again")),
            Err(TreeError::DuplicateResource(address("/host=a")))
        );
        // The original keeps its attributes.
        assert_eq!(
            txn.read_model(&address("/host=a")).unwrap().get("name"),
            Some(&ModelValue::from("a"))
        );
        assert_eq!(
            txn.create_resource(&address("/host=c/server=x"), named("x")),
            Err(TreeError::ResourceNotFound(address("/host=c")))
        );
        assert_eq!(
            txn.create_resource(&PathAddress::root(), named("root")),
            Err(TreeError::DuplicateResource(PathAddress::root()))
        );
    }

    #[test]
    fn remove_rejects_missing_populated_and_root_targets() {
        let tree = seeded();
        let mut txn = tree.begin(Some(PathAddress::root()));

        assert_eq!(
            txn.remove_resource(&address("/host=c"), false),
            Err(TreeError::ResourceNotFound(address("/host=c")))
        );
        assert_eq!(
            txn.remove_resource(&address("/host=a"), false),
            Err(TreeError::ResourceHasChildren(address("/host=a")))
        );
        assert_eq!(
            txn.remove_resource(&PathAddress::root(), true),
            Err(TreeError::RootRemoval)
        );
    }

    #[test]
    fn recursive_remove_takes_the_whole_subtree() {
        let tree = seeded();
        let mut txn = tree.begin(Some(address("/host=a")));
        txn.remove_resource(&address("/host=a"), true).unwrap();
        txn.commit();

        assert!(tree.lookup(&address("/host=a")).is_err());
        assert!(tree.lookup(&address("/host=a/server=web")).is_err());
        assert!(tree.lookup(&address("/host=b")).is_ok());
    }

    #[test]
    fn wildcard_addresses_cannot_be_written() {
        let tree = seeded();
        let mut txn = tree.begin(Some(PathAddress::root()));
        let pattern = address("/host=*");

        assert_eq!(
            txn.create_resource(&pattern, named("x")),
            Err(TreeError::WildcardMutation(pattern.clone()))
        );
        assert_eq!(
            txn.remove_resource(&pattern, false),
            Err(TreeError::WildcardMutation(pattern.clone()))
        );
        assert!(matches!(
            txn.read_model_for_update(&pattern),
            Err(TreeError::WildcardMutation(_))
        ));
    }

    #[test]
    fn wildcard_reads_are_fine_inside_a_transaction() {
        let tree = seeded();
        let txn = tree.begin(None);
        let matches = txn.query(&address("/host=*"));
        assert_eq!(matches.len(), 2);
    }

    // ---- Scopes ----

    #[test]
    fn writes_outside_a_contended_scope_are_rejected() {
        let tree = seeded();
        let _holder = tree.begin(Some(address("/host=a")));
        let mut txn = tree.begin(Some(address("/host=b")));

        assert_eq!(
            txn.create_resource(&address("/host=a/server=x"), named("x")),
            Err(TreeError::ScopeConflict(address("/host=a/server=x")))
        );
        // The uncontended extension goes through.
        txn.read_model_for_update(&address("/host=b"))
            .unwrap()
            .set("name", "b2")
            .unwrap();
    }

    #[test]
    fn scope_extension_sees_freshly_committed_state() {
        let tree = seeded();
        let mut txn = tree.begin(Some(address("/host=a")));

        // Another operation commits under a prefix outside txn's scope.
        {
            let mut other = tree.begin(Some(address("/host=b")));
            other
                .read_model_for_update(&address("/host=b"))
                .unwrap()
                .set("name", "fresh")
                .unwrap();
            other.commit();
        }

        // Extending into that prefix must observe the commit, not the
        // snapshot taken at begin.
        let model = txn.read_model_for_update(&address("/host=b")).unwrap();
        assert_eq!(model.get("name"), Some(&ModelValue::from("fresh")));
    }

    #[test]
    fn scope_extension_sees_resources_created_after_begin() {
        let tree = seeded();
        let mut txn = tree.begin(Some(address("/host=a")));

        {
            let mut other = tree.begin(Some(address("/host=c")));
            other.create_resource(&address("/host=c"), named("c")).unwrap();
            other.commit();
        }

        assert!(txn.read_model_for_update(&address("/host=c")).is_ok());
    }

    #[test]
    fn begin_blocks_behind_an_overlapping_transaction() {
        let tree = Arc::new(seeded());
        let holder = tree.begin(Some(address("/host=a")));

        let (done_tx, done_rx) = mpsc::channel();
        let contender = {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut txn = tree.begin(Some(address("/host=a/server=web")));
                txn.read_model_for_update(&address("/host=a/server=web"))
                    .unwrap()
                    .set("name", "second")
                    .unwrap();
                txn.commit();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(holder);
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        contender.join().unwrap();

        assert_eq!(
            tree.lookup(&address("/host=a/server=web")).unwrap().get("name"),
            Some(&ModelValue::from("second"))
        );
    }

    #[test]
    fn serialized_writers_never_lose_updates() {
        let tree = Arc::new(ResourceTree::new());
        {
            let mut txn = tree.begin(Some(PathAddress::root()));
            txn.read_model_for_update(&PathAddress::root())
                .unwrap()
                .set("counter", 0_i64)
                .unwrap();
            txn.commit();
        }

        let mut workers = Vec::new();
        for _ in 0..8 {
            let tree = Arc::clone(&tree);
            workers.push(thread::spawn(move || {
                for _ in 0..25 {
                    let mut txn = tree.begin(Some(PathAddress::root()));
                    let model = txn.read_model_for_update(&PathAddress::root()).unwrap();
                    let current = model.get("counter").and_then(ModelValue::as_i64).unwrap();
                    model.set("counter", current + 1).unwrap();
                    txn.commit();
                }
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        let counter = tree
            .lookup(&PathAddress::root())
            .unwrap()
            .get("counter")
            .and_then(ModelValue::as_i64);
        assert_eq!(counter, Some(200));
    }
}
