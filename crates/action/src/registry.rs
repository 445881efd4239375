//! Action discovery and retrieval.

use std::collections::HashMap;
use std::sync::Arc;

use crate::action::Action;
use crate::definition::ActionDefinition;

/// Type-erased registry for discovering and retrieving actions by key.
///
/// The host populates this at startup and the engine uses it to resolve
/// node `type` strings from workflow definitions to concrete
/// implementations. Actions are stored as `Arc<dyn Action>` so they can be
/// shared across concurrent executions.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under its definition key. Overwrites any existing
    /// action with the same key.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let key = action.definition().key.clone();
        self.actions.insert(key, action);
    }

    /// Look up an action by its key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(key)
    }

    /// Check whether an action with the given key is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.actions.contains_key(key)
    }

    /// Return definitions for all registered actions.
    #[must_use]
    pub fn list(&self) -> Vec<&ActionDefinition> {
        self.actions.values().map(|a| a.definition()).collect()
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Remove an action by key. Returns the removed action, if any.
    pub fn unregister(&mut self, key: &str) -> Option<Arc<dyn Action>> {
        self.actions.remove(key)
    }

    /// Iterate over all registered `(key, action)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Action>)> {
        self.actions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("count", &self.actions.len())
            .field("keys", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
