//! Per-run cache of large values referenced by `STORED:<key>` placeholders.
//!
//! Tools that produce values too large to pass through the model (for example
//! a base64-encoded image) put them here and hand the model the placeholder;
//! the submission client swaps the placeholder back for the real value.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

/// Cheap-clone handle to one run's stored values.
#[derive(Debug, Clone, Default)]
pub struct StoredValueCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl StoredValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(key.into(), value.into());
    }

    /// Store `value` under a fresh key and return the key.
    pub fn insert_generated(&self, value: impl Into<String>) -> String {
        let key = Uuid::new_v4().simple().to_string()[..12].to_string();
        self.insert(key.clone(), value);
        key
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_distinct_and_retrievable() {
        let cache = StoredValueCache::new();
        let a = cache.insert_generated("first");
        let b = cache.insert_generated("second");
        assert_ne!(a, b);
        assert_eq!(cache.get(&a).as_deref(), Some("first"));
        assert_eq!(cache.get(&b).as_deref(), Some("second"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clones_share_contents() {
        let cache = StoredValueCache::new();
        let writer = cache.clone();
        writer.insert("k1", "42");
        assert_eq!(cache.get("k1").as_deref(), Some("42"));
        assert_eq!(cache.get("missing"), None);
    }
}
