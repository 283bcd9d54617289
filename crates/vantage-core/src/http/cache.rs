//! Time-bounded cache of successful GET responses
//!
//! Entries are keyed by URL plus canonically serialized query parameters.
//! An entry older than the configured duration is treated as absent, and a
//! background sweep at the same interval purges expired entries so memory
//! stays bounded regardless of access patterns. Mutating requests never
//! populate the cache; the orchestrator invalidates by resource prefix
//! after successful mutations instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use super::normalizer::ApiResponse;

#[derive(Debug, Clone)]
struct CacheEntry {
    data: ApiResponse,
    stored_at: Instant,
}

/// TTL cache for normalized GET responses
pub struct ResponseCache {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Mutex::new(None),
        }
    }

    /// Cache key for a URL and its query parameters
    pub fn key_for(url: &str, params: &[(String, String)]) -> String {
        if params.is_empty() {
            return url.to_string();
        }
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        let query: Vec<String> = sorted.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        format!("{}?{}", url, query.join("&"))
    }

    /// Fresh entry for the key, if any
    pub fn get(&self, key: &str) -> Option<ApiResponse> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).and_then(|entry| {
            if entry.stored_at.elapsed() < self.ttl {
                Some(entry.data.clone())
            } else {
                None
            }
        })
    }

    /// Store or overwrite an entry
    pub fn set(&self, key: impl Into<String>, data: ApiResponse) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.into(),
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    /// Remove entries whose key contains the given fragment, or all entries
    /// when no fragment is given. Returns the number of removed entries.
    pub fn invalidate(&self, url_fragment: Option<&str>) -> usize {
        let mut entries = self.entries.lock().unwrap();
        match url_fragment {
            Some(fragment) => {
                let before = entries.len();
                entries.retain(|key, _| !key.contains(fragment));
                before - entries.len()
            }
            None => {
                let removed = entries.len();
                entries.clear();
                removed
            }
        }
    }

    /// Drop expired entries. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Start the periodic sweep task. Idempotent; requires a tokio runtime.
    pub fn spawn_sweeper(&self) {
        let mut sweeper = self.sweeper.lock().unwrap();
        if sweeper.is_some() {
            return;
        }
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                let mut entries = entries.lock().unwrap();
                let before = entries.len();
                entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
                let removed = before - entries.len();
                if removed > 0 {
                    debug!(removed, "cache sweep purged expired entries");
                }
            }
        }));
    }

    /// Stop the sweep task
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for ResponseCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
