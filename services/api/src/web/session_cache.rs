//! services/api/src/web/session_cache.rs
//!
//! A short-lived cache that collapses repeated session-initiation calls carrying
//! the same token. Entries live for a fixed TTL; a sweep task spawned at startup
//! evicts stale entries until the process shuts down.
//!
//! The cache only suppresses noise. A miss always falls through to the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct SessionCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> SessionCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value for `token`, if it was stored less than one TTL ago.
    pub async fn get(&self, token: &str) -> Option<V> {
        let entries = self.entries.lock().await;
        entries
            .get(token)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub async fn insert(&self, token: &str, value: V) {
        self.entries
            .lock()
            .await
            .insert(token.to_string(), (Instant::now(), value));
    }

    pub async fn remove(&self, token: &str) {
        self.entries.lock().await.remove(token);
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl<V: Clone + Send + 'static> SessionCache<V> {
    /// Sweeps once per TTL until `shutdown` is cancelled.
    pub async fn run_sweeper(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.ttl);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Session cache sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = self.sweep().await;
                    if evicted > 0 {
                        debug!(evicted, "Swept stale session cache entries");
                    }
                }
            }
        }
    }
}
