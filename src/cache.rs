//! Time-bounded cache in front of the aggregation pipeline.
//!
//! One [`FreshnessCache`] serves every request in the process. State is an
//! immutable [`CacheSnapshot`] behind an `RwLock`; a refresh builds a whole new
//! snapshot with no lock held and swaps it in at the end. A separate gate
//! mutex keeps at most one aggregation in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;

use crate::feed::{AggregateReport, Aggregator, Article, FeedReader};

/// Default time-to-live for an aggregation (1 hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default upper bound on how long a caller waits for an in-flight refresh
/// when there is nothing cached to fall back to.
pub const DEFAULT_REFRESH_WAIT: Duration = Duration::from_secs(60);

/// Result of one aggregation, as stored in the cache.
#[derive(Debug)]
pub struct CacheSnapshot {
    pub articles: Arc<[Article]>,
    /// Monotonic start time of the aggregation; TTL age is measured from here.
    pub refreshed_at: Instant,
    /// Wall-clock time of the same moment, for display.
    pub fetched_at: DateTime<Utc>,
    pub report: AggregateReport,
}

impl CacheSnapshot {
    pub fn age(&self) -> Duration {
        self.refreshed_at.elapsed()
    }
}

pub struct FreshnessCache<R> {
    aggregator: Aggregator<R>,
    ttl: Duration,
    refresh_wait: Duration,
    state: RwLock<Option<Arc<CacheSnapshot>>>,
    refresh_gate: Mutex<()>,
    aggregations: AtomicU64,
}

impl<R: FeedReader> FreshnessCache<R> {
    pub fn new(aggregator: Aggregator<R>) -> Self {
        Self {
            aggregator,
            ttl: DEFAULT_TTL,
            refresh_wait: DEFAULT_REFRESH_WAIT,
            state: RwLock::new(None),
            refresh_gate: Mutex::new(()),
            aggregations: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_refresh_wait(mut self, wait: Duration) -> Self {
        self.refresh_wait = wait;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of aggregations run since construction.
    pub fn aggregations(&self) -> u64 {
        self.aggregations.load(Ordering::Relaxed)
    }

    /// Current snapshot, fresh or not. `None` until the first aggregation lands.
    pub async fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.state.read().await.clone()
    }

    /// Snapshot for a page render.
    ///
    /// Returns the cached snapshot while it is younger than the TTL, otherwise
    /// re-aggregates. If another caller is already refreshing, the stale
    /// snapshot is returned immediately; with nothing cached the caller waits
    /// for that refresh, up to the configured bound, and gets `None` on
    /// timeout.
    ///
    /// The aggregation runs inside the caller's future. Dropping that future
    /// (a client disconnect, an outer timeout) abandons the refresh and
    /// releases the gate; the next caller starts a new one.
    pub async fn get_snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            tracing::debug!(
                age_secs = snapshot.age().as_secs(),
                "Returning cached articles"
            );
            return Some(snapshot);
        }

        match self.refresh_gate.try_lock() {
            Ok(guard) => Some(self.refresh_locked(guard, false).await),
            Err(_) => {
                if let Some(stale) = self.snapshot().await {
                    tracing::debug!(
                        age_secs = stale.age().as_secs(),
                        "Refresh in flight, serving previous articles"
                    );
                    return Some(stale);
                }

                match tokio::time::timeout(self.refresh_wait, self.refresh_gate.lock()).await {
                    Ok(guard) => Some(self.refresh_locked(guard, false).await),
                    Err(_) => {
                        tracing::warn!(
                            wait_secs = self.refresh_wait.as_secs(),
                            "Timed out waiting for in-flight refresh"
                        );
                        self.snapshot().await
                    }
                }
            }
        }
    }

    /// Articles for a page render. Same rules as [`Self::get_snapshot`], with
    /// an empty list standing in for a missing snapshot.
    pub async fn get_articles(&self) -> Arc<[Article]> {
        match self.get_snapshot().await {
            Some(snapshot) => Arc::clone(&snapshot.articles),
            None => Arc::from(Vec::<Article>::new()),
        }
    }

    /// Re-aggregate now regardless of age and return the new list.
    ///
    /// Waits for any refresh already in flight before starting its own.
    pub async fn refresh(&self) -> Arc<[Article]> {
        let guard = self.refresh_gate.lock().await;
        Arc::clone(&self.refresh_locked(guard, true).await.articles)
    }

    async fn fresh_snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.state
            .read()
            .await
            .as_ref()
            .filter(|s| s.age() < self.ttl)
            .cloned()
    }

    /// Caller holds the refresh gate for the duration of this call.
    async fn refresh_locked(&self, _gate: MutexGuard<'_, ()>, force: bool) -> Arc<CacheSnapshot> {
        // Someone else may have finished a refresh while we waited on the gate
        if !force {
            if let Some(snapshot) = self.fresh_snapshot().await {
                return snapshot;
            }
        }

        let refreshed_at = Instant::now();
        let fetched_at = Utc::now();
        let aggregated = self.aggregator.aggregate().await;
        self.aggregations.fetch_add(1, Ordering::Relaxed);

        if aggregated.articles.is_empty() {
            tracing::warn!(
                retry_in_secs = self.ttl.as_secs(),
                "Aggregation produced no articles, caching empty result"
            );
        }

        let snapshot = Arc::new(CacheSnapshot {
            articles: aggregated.articles.into(),
            refreshed_at,
            fetched_at,
            report: aggregated.report,
        });

        *self.state.write().await = Some(Arc::clone(&snapshot));
        snapshot
    }
}
