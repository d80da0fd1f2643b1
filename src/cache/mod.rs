// src/cache/mod.rs

pub mod clock;

use crate::error::Result;
use crate::sheets::{RawRow, SheetSource};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

pub use clock::{Clock, ManualClock, SystemClock};

struct CacheEntry {
    fetched_at: Instant,
    rows: Arc<Vec<RawRow>>,
}

/// Freshness report for one cached tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabStatus {
    pub tab: String,
    pub rows: usize,
    pub age_secs: u64,
    pub fresh: bool,
}

/// Time-bounded, per-tab cache in front of a [`SheetSource`].
///
/// A refresh of one tab is performed by a single caller at a time; others
/// asking for the same tab wait on that tab's lock and reuse the result. The
/// entry map itself is only locked for lookups and swaps, never across the
/// upstream call, so other tabs stay readable during a slow fetch.
pub struct SheetCache {
    source: Arc<dyn SheetSource>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SheetCache {
    pub fn new(source: Arc<dyn SheetSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_clock(source: Arc<dyn SheetSource>, ttl: Duration) -> Self {
        Self::new(source, ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Rows of `tab`, fetching upstream when the entry is missing or older than the TTL.
    ///
    /// A failed fetch is returned to the caller as-is; whatever entry existed
    /// before stays in place.
    pub async fn get(&self, tab: &str) -> Result<Arc<Vec<RawRow>>> {
        if let Some(rows) = self.fresh(tab) {
            debug!(tab, "cache hit");
            return Ok(rows);
        }

        let _refresh = self.acquire(tab).await;
        // someone else may have refreshed while we waited
        if let Some(rows) = self.fresh(tab) {
            debug!(tab, "cache filled by concurrent refresh");
            return Ok(rows);
        }

        let fetched_at = self.clock.now();
        match self.source.fetch_rows(tab).await {
            Ok(rows) => {
                let rows = Arc::new(rows);
                info!(tab, rows = rows.len(), "cache refreshed");
                self.entries
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(
                        tab.to_string(),
                        CacheEntry {
                            fetched_at,
                            rows: Arc::clone(&rows),
                        },
                    );
                Ok(rows)
            }
            Err(err) => {
                let kept_stale = self.has_entry(tab);
                warn!(tab, error = %err, kept_stale, "upstream fetch failed");
                Err(err)
            }
        }
    }

    /// Per-tab freshness, sorted by tab name.
    pub fn status(&self) -> Vec<TabStatus> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<TabStatus> = entries
            .iter()
            .map(|(tab, e)| {
                let age = now.saturating_duration_since(e.fetched_at);
                TabStatus {
                    tab: tab.clone(),
                    rows: e.rows.len(),
                    age_secs: age.as_secs(),
                    fresh: age < self.ttl,
                }
            })
            .collect();
        out.sort_by(|a, b| a.tab.cmp(&b.tab));
        out
    }

    fn fresh(&self, tab: &str) -> Option<Arc<Vec<RawRow>>> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(tab)
            .filter(|e| now.saturating_duration_since(e.fetched_at) < self.ttl)
            .map(|e| Arc::clone(&e.rows))
    }

    fn has_entry(&self, tab: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(tab)
    }

    async fn acquire(&self, tab: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(tab.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatrizError;
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts upstream calls; `slow` tabs sleep before answering.
    struct FakeSource {
        calls: AtomicUsize,
        failing: AtomicBool,
        rows: usize,
        delay: Duration,
        slow_tab: Option<&'static str>,
    }

    impl FakeSource {
        fn new(rows: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                rows,
                delay: Duration::ZERO,
                slow_tab: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SheetSource for FakeSource {
        async fn fetch_rows(&self, tab: &str) -> Result<Vec<RawRow>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_tab == Some(tab) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            } else if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(MatrizError::upstream(tab, "connection refused"));
            }
            Ok((0..self.rows)
                .map(|i| {
                    RawRow::from([
                        ("PEP".to_string(), format!("{}-{}", tab, i)),
                        ("FETCH".to_string(), n.to_string()),
                    ])
                })
                .collect())
        }

        async fn list_tabs(&self) -> Result<Vec<String>> {
            Ok(vec!["Prazos SAP".to_string()])
        }
    }

    fn cache_with(source: Arc<FakeSource>, clock: Arc<ManualClock>) -> SheetCache {
        SheetCache::new(source, Duration::from_secs(300), clock)
    }

    #[tokio::test]
    async fn ttl_window_bounds_upstream_fetches() -> Result<()> {
        let source = Arc::new(FakeSource::new(12));
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(source.clone(), clock.clone());

        let first = cache.get("Prazos SAP").await?;
        assert_eq!(first.len(), 12);
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::from_secs(299));
        let second = cache.get("Prazos SAP").await?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::from_secs(2));
        let third = cache.get("Prazos SAP").await?;
        assert_eq!(third.len(), 12);
        assert_eq!(source.calls(), 2);
        assert_eq!(third[0]["FETCH"], "1");
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() -> Result<()> {
        let source = Arc::new(FakeSource {
            delay: Duration::from_millis(50),
            ..FakeSource::new(3)
        });
        let cache = cache_with(source.clone(), Arc::new(ManualClock::new()));

        let results = join_all((0..16).map(|_| cache.get("Prazos SAP"))).await;
        for r in results {
            assert_eq!(r?.len(), 3);
        }
        assert_eq!(source.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn slow_fetch_does_not_block_other_tabs() -> Result<()> {
        let source = Arc::new(FakeSource {
            slow_tab: Some("lenta"),
            ..FakeSource::new(2)
        });
        let cache = Arc::new(cache_with(source.clone(), Arc::new(ManualClock::new())));
        cache.get("GERAL").await?;

        let slow = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("lenta").await.map(|r| r.len()) }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cached = tokio::time::timeout(Duration::from_secs(1), cache.get("GERAL"))
            .await
            .expect("fresh read should not wait on another tab");
        assert_eq!(cached?.len(), 2);
        let other = tokio::time::timeout(Duration::from_secs(1), cache.get("meta"))
            .await
            .expect("refresh of a different tab should not wait");
        assert_eq!(other?.len(), 2);

        slow.abort();
        Ok(())
    }

    #[tokio::test]
    async fn failed_refresh_propagates_and_keeps_stale_entry() -> Result<()> {
        let source = Arc::new(FakeSource::new(5));
        let clock = Arc::new(ManualClock::new());
        let cache = cache_with(source.clone(), clock.clone());
        cache.get("Prazos SAP").await?;

        clock.advance(Duration::from_secs(200));
        cache.get("meta").await?;
        assert_eq!(source.calls(), 2);

        clock.advance(Duration::from_secs(150));
        source.failing.store(true, Ordering::SeqCst);
        let err = cache.get("Prazos SAP").await.unwrap_err();
        assert!(matches!(err, MatrizError::UpstreamUnavailable { .. }));

        // the other tab is still within its window
        assert_eq!(cache.get("meta").await?.len(), 5);

        let status = cache.status();
        let prazos = status.iter().find(|s| s.tab == "Prazos SAP").unwrap();
        assert_eq!(prazos.rows, 5);
        assert!(!prazos.fresh);

        source.failing.store(false, Ordering::SeqCst);
        let recovered = cache.get("Prazos SAP").await?;
        assert_eq!(recovered.len(), 5);
        assert!(cache.status().iter().all(|s| s.fresh));
        Ok(())
    }

    #[tokio::test]
    async fn miss_with_failing_upstream_caches_nothing() {
        let source = Arc::new(FakeSource::new(1));
        source.failing.store(true, Ordering::SeqCst);
        let cache = cache_with(source.clone(), Arc::new(ManualClock::new()));
        assert!(cache.get("Prazos SAP").await.is_err());
        assert!(cache.status().is_empty());
        assert!(cache.get("Prazos SAP").await.is_err());
        assert_eq!(source.calls(), 2);
    }
}
