//! In-flight request registry.
//!
//! Concurrent callers asking for the same [`PendingKey`] share one request.
//! The request runs on its own tokio task, so it always completes and
//! performs its cache write even when every caller has gone away. The task
//! owns a guard that removes the entry as soon as the request settles.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use metrics::gauge;
use tracing::debug;

use crate::domain::error::ApiError;

use super::keys::PendingKey;

const METRIC_PENDING_REQUESTS: &str = "fleetview_pending_requests";

pub type RequestFuture<T> = BoxFuture<'static, Result<T, ApiError>>;
pub type SharedRequest<T> = Shared<RequestFuture<T>>;

pub struct PendingRequests<T> {
    name: &'static str,
    inflight: Arc<DashMap<PendingKey, SharedRequest<T>>>,
}

impl<T> PendingRequests<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `name` labels the pending-request gauge (`loader`, `updater`).
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Join the request registered under `key`, or spawn `start()` and
    /// register it. The flag is true when an existing request was joined.
    ///
    /// Must be called from within a tokio runtime.
    pub fn join_or_start<F>(&self, key: PendingKey, start: F) -> (SharedRequest<T>, bool)
    where
        F: FnOnce() -> RequestFuture<T>,
    {
        let outcome = match self.inflight.entry(key) {
            Entry::Occupied(occupied) => (occupied.get().clone(), true),
            Entry::Vacant(vacant) => {
                let guard = PendingGuard {
                    name: self.name,
                    key: vacant.key().clone(),
                    inflight: Arc::clone(&self.inflight),
                };
                let work = start();
                let task = tokio::spawn(async move {
                    let _guard = guard;
                    work.await
                });
                let request: SharedRequest<T> = async move {
                    task.await
                        .unwrap_or_else(|err| Err(ApiError::aborted(err.to_string())))
                }
                .boxed()
                .shared();
                vacant.insert(request.clone());
                (request, false)
            }
        };

        gauge!(METRIC_PENDING_REQUESTS, "registry" => self.name).set(self.inflight.len() as f64);
        outcome
    }

    pub fn is_pending(&self, key: &PendingKey) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

/// Evicts its key when the owning task finishes, panics or is cancelled.
struct PendingGuard<T> {
    name: &'static str,
    key: PendingKey,
    inflight: Arc<DashMap<PendingKey, SharedRequest<T>>>,
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
        gauge!(METRIC_PENDING_REQUESTS, "registry" => self.name).set(self.inflight.len() as f64);
        debug!(
            cache_key = %self.key.cache_key(),
            scope = self.key.scope(),
            "Pending request settled"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;
    use crate::cache::keys::{CacheKey, IndexedParams};

    async fn explode() -> Result<usize, ApiError> {
        panic!("fetch exploded")
    }

    fn key(name: &str) -> PendingKey {
        PendingKey::load(&CacheKey::from(name), &IndexedParams::default())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_request() {
        let pending: PendingRequests<usize> = PendingRequests::new("test");
        let starts = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let counter = Arc::clone(&starts);
        let (first, joined_first) = pending.join_or_start(key("pods"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let _ = gate.await;
                Ok(7)
            }
            .boxed()
        });
        let counter = Arc::clone(&starts);
        let (second, joined_second) = pending.join_or_start(key("pods"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(8) }.boxed()
        });

        assert!(!joined_first);
        assert!(joined_second);
        assert!(pending.is_pending(&key("pods")));

        let _ = release.send(());
        assert_eq!(first.await, Ok(7));
        assert_eq!(second.await, Ok(7));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entry_is_evicted_on_settle() {
        let pending: PendingRequests<usize> = PendingRequests::new("test");

        let (request, _) = pending.join_or_start(key("nodes"), || async { Ok(1) }.boxed());
        assert_eq!(request.await, Ok(1));
        tokio::task::yield_now().await;
        assert!(pending.is_empty());

        let (request, joined) = pending.join_or_start(key("nodes"), || async { Ok(2) }.boxed());
        assert!(!joined);
        assert_eq!(request.await, Ok(2));
    }

    #[tokio::test]
    async fn failures_are_shared_and_evicted() {
        let pending: PendingRequests<usize> = PendingRequests::new("test");

        let (request, _) = pending.join_or_start(key("alarms"), || {
            async { Err(ApiError::transport("connection reset")) }.boxed()
        });
        assert_eq!(request.await, Err(ApiError::transport("connection reset")));
        tokio::task::yield_now().await;
        assert!(!pending.is_pending(&key("alarms")));
    }

    #[tokio::test]
    async fn request_completes_without_callers() {
        let pending: PendingRequests<usize> = PendingRequests::new("test");
        let completed = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();

        let marker = Arc::clone(&completed);
        let (request, _) = pending.join_or_start(key("tenants"), move || {
            async move {
                let _ = gate.await;
                marker.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            }
            .boxed()
        });
        drop(request);

        let _ = release.send(());
        for _ in 0..100 {
            if completed.load(Ordering::SeqCst) == 1 && pending.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn panicking_request_reports_aborted() {
        let pending: PendingRequests<usize> = PendingRequests::new("test");
        let (request, _) = pending.join_or_start(key("roles"), || explode().boxed());

        let result = request.await;
        assert!(matches!(result, Err(ApiError::Aborted { .. })));
        tokio::task::yield_now().await;
        assert!(pending.is_empty());
    }
}
