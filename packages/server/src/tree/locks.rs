//! Address-prefix write scopes.
//!
//! Each operation owns one or more address prefixes for its whole lifetime.
//! Two prefixes conflict when either is a prefix of the other, so a writer
//! under `/host=a` excludes a writer at `/` but not one under `/host=b`.
//!
//! Initial acquisition blocks until every conflicting holder releases. The
//! acquirer holds nothing at that point, so blocking cannot deadlock.
//! Extending an existing scope never blocks: the holder already owns
//! prefixes that other operations may be queued on, and waiting here could
//! deadlock two extenders against each other. Extension either succeeds
//! immediately or fails and the operation rolls back.

use std::sync::atomic::{AtomicU64, Ordering};

use bosun_core::PathAddress;
use parking_lot::{Condvar, Mutex};

/// Two prefixes contend when either covers the other.
fn overlaps(a: &PathAddress, b: &PathAddress) -> bool {
    a.is_prefix_of(b) || b.is_prefix_of(a)
}

#[derive(Debug)]
struct HeldScope {
    owner: u64,
    prefix: PathAddress,
}

/// The table of live write scopes, one entry per held prefix.
#[derive(Debug, Default)]
pub struct ScopeTable {
    held: Mutex<Vec<HeldScope>>,
    released: Condvar,
    next_owner: AtomicU64,
}

impl ScopeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a fresh scope over `prefix`, blocking until no other
    /// operation holds an overlapping prefix.
    pub fn acquire(&self, prefix: PathAddress) -> WriteScope<'_> {
        let owner = self.next_owner.fetch_add(1, Ordering::Relaxed);
        let mut held = self.held.lock();
        while held.iter().any(|scope| overlaps(&scope.prefix, &prefix)) {
            tracing::debug!(prefix = %prefix, "write scope contended, waiting");
            self.released.wait(&mut held);
        }
        held.push(HeldScope {
            owner,
            prefix: prefix.clone(),
        });
        WriteScope {
            table: self,
            owner,
            prefixes: vec![prefix],
        }
    }

    /// A scope that owns no prefixes. Read-only operations run under one.
    #[must_use]
    pub fn empty_scope(&self) -> WriteScope<'_> {
        let owner = self.next_owner.fetch_add(1, Ordering::Relaxed);
        WriteScope {
            table: self,
            owner,
            prefixes: Vec::new(),
        }
    }

    /// Number of live held prefixes.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// The set of prefixes one operation may write under. Dropping the scope
/// releases every prefix and wakes blocked acquirers.
#[derive(Debug)]
pub struct WriteScope<'t> {
    table: &'t ScopeTable,
    owner: u64,
    prefixes: Vec<PathAddress>,
}

impl WriteScope<'_> {
    /// Whether `address` falls under a held prefix.
    #[must_use]
    pub fn covers(&self, address: &PathAddress) -> bool {
        self.prefixes.iter().any(|p| p.is_prefix_of(address))
    }

    /// Tries to add `prefix` to this scope without blocking.
    ///
    /// Fails when another operation holds an overlapping prefix, and also
    /// when `prefix` would widen over a prefix this scope already holds.
    /// An operation that needs the wider scope must acquire it up front.
    pub fn try_extend(&mut self, prefix: &PathAddress) -> bool {
        if self.covers(prefix) {
            return true;
        }
        if self.prefixes.iter().any(|held| prefix.is_prefix_of(held)) {
            return false;
        }
        let mut held = self.table.held.lock();
        let contended = held
            .iter()
            .any(|scope| scope.owner != self.owner && overlaps(&scope.prefix, prefix));
        if contended {
            return false;
        }
        held.push(HeldScope {
            owner: self.owner,
            prefix: prefix.clone(),
        });
        drop(held);
        self.prefixes.push(prefix.clone());
        true
    }

    /// The prefixes this scope holds, in acquisition order.
    #[must_use]
    pub fn prefixes(&self) -> &[PathAddress] {
        &self.prefixes
    }
}

impl Drop for WriteScope<'_> {
    fn drop(&mut self) {
        if self.prefixes.is_empty() {
            return;
        }
        let mut held = self.table.held.lock();
        held.retain(|scope| scope.owner != self.owner);
        drop(held);
        self.table.released.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
