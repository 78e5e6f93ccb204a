//! crates/schoolhub_core/src/store.rs
//!
//! A thin handle around an `EntityStore` that bounds every call with a timeout.
//! All core services talk to the store through this handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::ports::{EntityStore, PortError, PortResult};

/// The per-call limit used when none is configured.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn EntityStore>,
    call_timeout: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn EntityStore>, call_timeout: Duration) -> Self {
        Self {
            inner,
            call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Runs one store operation. An elapsed timeout is reported as
    /// `StoreUnavailable`, never as an empty result.
    pub async fn call<'a, T, F, Fut>(&'a self, op: &'static str, f: F) -> PortResult<T>
    where
        F: FnOnce(&'a dyn EntityStore) -> Fut,
        Fut: Future<Output = PortResult<T>> + 'a,
    {
        match tokio::time::timeout(self.call_timeout, f(self.inner.as_ref())).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout_ms = self.call_timeout.as_millis() as u64, "Store call timed out");
                Err(PortError::StoreUnavailable(format!(
                    "{} timed out after {}ms",
                    op,
                    self.call_timeout.as_millis()
                )))
            }
        }
    }
}

impl From<Arc<dyn EntityStore>> for BoundedStore {
    fn from(inner: Arc<dyn EntityStore>) -> Self {
        Self::new(inner, DEFAULT_CALL_TIMEOUT)
    }
}
