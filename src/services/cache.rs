//! In-process query cache.
//!
//! A TTL-bounded memoization layer for read projections (book listings,
//! searches). It is never consulted for custody decisions or delete guards,
//! and every catalog mutation clears it, so it cannot serve stale custody
//! state. The application is correct with the cache disabled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct QueryCache {
    enabled: bool,
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, (Instant, serde_json::Value)>>>,
}

impl QueryCache {
    pub fn new(enabled: bool, ttl: Duration) -> Self {
        Self {
            enabled,
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look up a cached value, honoring the TTL
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let entries = self.entries.read().await;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() > self.ttl {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Store a value under the given key
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) {
        if !self.enabled {
            return;
        }

        if let Ok(json) = serde_json::to_value(value) {
            self.entries
                .write()
                .await
                .insert(key.to_string(), (Instant::now(), json));
        }
    }

    /// Drop every cached entry. Called after any catalog or custody mutation.
    pub async fn clear(&self) {
        if !self.enabled {
            return;
        }
        self.entries.write().await.clear();
    }
}
