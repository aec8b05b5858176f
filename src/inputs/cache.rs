//! Pluggable input value cache
//!
//! Remembered values are keyed by (step key, variable). Retest relies
//! on this cache to reproduce the previous run's submissions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

/// Store of previously resolved input values
#[async_trait]
pub trait InputCache: Send + Sync {
    async fn get(&self, step_key: &str, variable: &str) -> Option<String>;
    async fn put(&self, step_key: &str, variable: &str, value: String);
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryInputCache {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryInputCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InputCache for MemoryInputCache {
    async fn get(&self, step_key: &str, variable: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(&(step_key.to_string(), variable.to_string()))
            .cloned()
    }

    async fn put(&self, step_key: &str, variable: &str, value: String) {
        self.values
            .lock()
            .unwrap()
            .insert((step_key.to_string(), variable.to_string()), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_values_per_step_and_variable() {
        let cache = MemoryInputCache::new();
        cache.put("suite:step", "user", "alice".into()).await;

        assert_eq!(
            cache.get("suite:step", "user").await.as_deref(),
            Some("alice")
        );
        assert!(cache.get("suite:step", "other").await.is_none());
        assert!(cache.get("other:step", "user").await.is_none());
    }
}
