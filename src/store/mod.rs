//! Request-scoped assignment store.
//!
//! Request logic fills the store before rendering; the rendering pipeline reads a
//! snapshot of it and embeds that snapshot as the page state. One store belongs to
//! exactly one in-flight request: the engine creates and resets a fresh store per
//! request instead of sharing a process-wide instance, so parallel requests never
//! observe each other's values.
//!
//! # Examples
//!
//! ```rust
//! use islet::store::AssignmentStore;
//! use serde_json::json;
//!
//! let mut store = AssignmentStore::new();
//! store.assign("a", 1).assign("b", 2);
//!
//! assert_eq!(store.get("a"), Some(&json!(1)));
//! assert_eq!(store.get_all(), json!({"a": 1, "b": 2}).as_object().unwrap().clone());
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Key/value bag populated by request logic and read by the renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentStore {
    values: Map<String, Value>,
}

impl AssignmentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any previous value.
    ///
    /// Returns the store so assignments can be chained.
    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        tracing::trace!(target: "islet::store", "assign {}", key);
        self.values.insert(key, value.into());
        self
    }

    /// Serialize `value` and assign it to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn assign_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<&mut Self> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .with_context(|| format!("Value assigned to '{key}' is not JSON-serializable"))?;
        Ok(self.assign(key, value))
    }

    /// Current value of `key`, or `None` when it was never assigned.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Independent copy of every assignment.
    ///
    /// Mutating the returned map never affects the store.
    #[must_use]
    pub fn get_all(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// Remove every assignment.
    pub fn reset(&mut self) {
        tracing::trace!(target: "islet::store", "reset ({} entries dropped)", self.values.len());
        self.values.clear();
    }

    /// Number of assigned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chained_assign_and_get_all() {
        let mut store = AssignmentStore::new();
        store.assign("a", 1).assign("b", 2);

        let all = store.get_all();
        assert_eq!(Value::Object(all), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_get_all_returns_independent_copy() {
        let mut store = AssignmentStore::new();
        store.assign("a", 1).assign("b", 2);

        let mut copy = store.get_all();
        copy.insert("a".to_string(), json!(99));
        copy.insert("c".to_string(), json!(3));

        assert_eq!(Value::Object(store.get_all()), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_get_missing_key() {
        let store = AssignmentStore::new();
        assert_eq!(store.get("nope"), None);
    }

    #[test]
    fn test_reset_empties_store() {
        let mut store = AssignmentStore::new();
        store.assign("user", json!({"name": "ada"}));
        assert!(!store.is_empty());

        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.get("user"), None);
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_assign_overwrites() {
        let mut store = AssignmentStore::new();
        store.assign("x", 0).assign("x", 1);
        assert_eq!(store.get("x"), Some(&json!(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_assign_serialized() {
        #[derive(Serialize)]
        struct Post {
            title: String,
            tags: Vec<String>,
        }

        let mut store = AssignmentStore::new();
        store
            .assign_serialized(
                "post",
                &Post {
                    title: "Hello".to_string(),
                    tags: vec!["a".to_string()],
                },
            )
            .unwrap();

        assert_eq!(store.get("post"), Some(&json!({"title": "Hello", "tags": ["a"]})));
    }
}
