//! Short-lived GET response cache.
//!
//! Concurrent requests for the same URL share one in-flight request, and a
//! completed response is reused until the TTL passes. Writes clear
//! everything.

use crate::http::HttpResponse;
use eyre::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};

/// Time source for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Entry {
    created_at: Instant,
    cell: Arc<OnceCell<HttpResponse>>,
}

/// Cache of GET responses keyed by full URL.
pub struct RequestCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RequestCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached response for `url`, or run `fetch` and share its result.
    ///
    /// A failed fetch is not cached; the next caller tries again.
    pub async fn get_or_fetch<F, Fut>(&self, url: &str, fetch: F) -> Result<HttpResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HttpResponse>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            let now = self.clock.now();
            let ttl = self.ttl;
            entries.retain(|_, entry| now.duration_since(entry.created_at) < ttl);

            match entries.get(url) {
                Some(entry) => {
                    log::debug!("request cache hit for {}", crate::http::redact(url));
                    Arc::clone(&entry.cell)
                }
                None => {
                    let cell = Arc::new(OnceCell::new());
                    entries.insert(
                        url.to_string(),
                        Entry {
                            created_at: now,
                            cell: Arc::clone(&cell),
                        },
                    );
                    cell
                }
            }
        };

        let response = cell.get_or_try_init(fetch).await?;
        Ok(response.clone())
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of live entries, including in-flight ones.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|entry| now.duration_since(entry.created_at) < self.ttl)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
