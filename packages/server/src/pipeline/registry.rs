//! The operation handler registry.

use std::fmt;
use std::sync::Arc;

use bosun_core::ModelValue;
use dashmap::DashMap;

use super::step::StepHandler;

/// Name-keyed registry of operation handlers.
///
/// Registration happens during startup; lookups on the execution path are
/// lock-free reads.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing any previous handler.
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn StepHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(operation = %name, "replaced an existing operation handler");
        } else {
            tracing::debug!(operation = %name, "registered operation handler");
        }
    }

    /// The handler registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// The descriptive metadata of `name`'s handler.
    #[must_use]
    pub fn description(&self, name: &str) -> Option<ModelValue> {
        self.get(name).map(|handler| handler.description())
    }

    /// Every registered operation name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no operation is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
