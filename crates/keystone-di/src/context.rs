//! Environment and identity data passed at the contextualize stage

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Key under which a component finds its own role
pub const ROLE_KEY: &str = "role";
/// Key under which a component finds the owning container's name
pub const CONTAINER_KEY: &str = "container";

/// Errors raised by [`Context`] accessors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContextError {
    #[error("Context entry '{key}' not found")]
    Missing { key: String },
}

/// Key/value context with an optional parent; lookups fall through to the parent
#[derive(Debug, Clone, Default)]
pub struct Context {
    entries: BTreeMap<String, serde_json::Value>,
    parent: Option<Arc<Context>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty context chained to `parent`
    pub fn with_parent(parent: Arc<Context>) -> Self {
        Self {
            entries: BTreeMap::new(),
            parent: Some(parent),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries
            .get(key)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(key)))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(serde_json::Value::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&serde_json::Value, ContextError> {
        self.get(key).ok_or_else(|| ContextError::Missing {
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every visible key, own and inherited
    pub fn keys(&self) -> BTreeSet<&str> {
        let mut keys: BTreeSet<&str> = self
            .parent
            .as_ref()
            .map(|parent| parent.keys())
            .unwrap_or_default();
        keys.extend(self.entries.keys().map(String::as_str));
        keys
    }

    /// Role of the component this context was built for
    pub fn role(&self) -> Option<&str> {
        self.get_str(ROLE_KEY)
    }

    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }
}
