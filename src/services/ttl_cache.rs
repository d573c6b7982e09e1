//! Single-entry, time-to-live cache with demand-driven refresh.
//!
//! The whole cached value is one entry. Readers on the fresh path only take a
//! short read lock and clone an `Arc`; a refresh builds a complete new value
//! and publishes it in one write, so a value is never seen with the wrong
//! timestamp.
//!
//! At most one refresh runs at a time. Callers that find the entry stale while
//! a refresh is in flight wait for it and reuse its outcome, success or failure.
//!
//! A failed refresh never clears the entry: the caller gets the error together
//! with the last good value, and because the old timestamp is kept the next
//! caller retries.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A published cache value and when it was fetched.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: Arc<T>,
    pub fetched_at: DateTime<Utc>,
    stamped: Instant,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
            stamped: self.stamped,
        }
    }
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            fetched_at: Utc::now(),
            stamped: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stamped)
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() <= ttl
    }
}

/// Returned when a refresh was needed and failed.
pub struct RefreshFailure<T, E> {
    pub error: Arc<E>,
    /// The entry that was cached before the failed attempt, if there was one.
    pub last_good: Option<CacheEntry<T>>,
}

impl<T, E> Clone for RefreshFailure<T, E> {
    fn clone(&self) -> Self {
        Self {
            error: Arc::clone(&self.error),
            last_good: self.last_good.clone(),
        }
    }
}

impl<T, E: fmt::Debug> fmt::Debug for RefreshFailure<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshFailure")
            .field("error", &self.error)
            .field("has_last_good", &self.last_good.is_some())
            .finish()
    }
}

impl<T, E: fmt::Display> fmt::Display for RefreshFailure<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T, E> std::error::Error for RefreshFailure<T, E> where E: std::error::Error + 'static {}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

/// Point-in-time view of a cache, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub name: &'static str,
    pub state: CacheState,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub ttl_secs: u64,
    pub refreshes: u64,
    pub last_error: Option<String>,
}

pub struct TtlCache<T, E> {
    name: &'static str,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry<T>>>,
    // Outcome of the most recent completed refresh; only written under `refresh_lock`.
    last_error: Mutex<Option<Arc<E>>>,
    refreshes: AtomicU64,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl<T, E> TtlCache<T, E>
where
    E: fmt::Display,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entry: RwLock::new(None),
            last_error: Mutex::new(None),
            refreshes: AtomicU64::new(0),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The current entry, fresh or not, without triggering a refresh.
    pub fn peek(&self) -> Option<CacheEntry<T>> {
        self.entry.read().clone()
    }

    fn fresh_entry(&self) -> Option<CacheEntry<T>> {
        self.entry
            .read()
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .cloned()
    }

    /// Returns the cached value if it is within the TTL, otherwise runs `refresh`.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<CacheEntry<T>, RefreshFailure<T, E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Arc<E>>>,
    {
        if let Some(entry) = self.fresh_entry() {
            debug!("[{}] cache hit (age {:?})", self.name, entry.age());
            return Ok(entry);
        }

        let observed = self.refreshes.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.refreshes.load(Ordering::Acquire) != observed {
            // Another caller finished a refresh while we were waiting for the lock.
            let last_error = self.last_error.lock().clone();
            let current = self.peek();
            match (last_error, current) {
                (Some(error), last_good) => {
                    debug!("[{}] reusing failed in-flight refresh", self.name);
                    return Err(RefreshFailure { error, last_good });
                }
                (None, Some(entry)) => {
                    debug!("[{}] reusing in-flight refresh", self.name);
                    return Ok(entry);
                }
                (None, None) => {}
            }
        }

        if let Some(entry) = self.fresh_entry() {
            return Ok(entry);
        }

        debug!("[{}] cache miss, refreshing", self.name);
        let outcome = refresh().await;

        let result = match outcome {
            Ok(value) => {
                let entry = CacheEntry::new(value);
                *self.entry.write() = Some(entry.clone());
                *self.last_error.lock() = None;
                info!("🔄 [{}] cache refreshed", self.name);
                Ok(entry)
            }
            Err(error) => {
                let last_good = self.peek();
                warn!(
                    "❌ [{}] refresh failed (last good value kept: {}): {}",
                    self.name,
                    last_good.is_some(),
                    error
                );
                *self.last_error.lock() = Some(Arc::clone(&error));
                Err(RefreshFailure { error, last_good })
            }
        };

        self.refreshes.fetch_add(1, Ordering::Release);
        result
    }

    pub fn status(&self) -> CacheStatus {
        let entry = self.peek();
        let state = match &entry {
            None => CacheState::Empty,
            Some(e) if e.is_fresh(self.ttl) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        };

        CacheStatus {
            name: self.name,
            state,
            fetched_at: entry.as_ref().map(|e| e.fetched_at),
            age_secs: entry.as_ref().map(|e| e.age().as_secs()),
            ttl_secs: self.ttl.as_secs(),
            refreshes: self.refreshes.load(Ordering::Acquire),
            last_error: self.last_error.lock().as_ref().map(|e| e.to_string()),
        }
    }
}
