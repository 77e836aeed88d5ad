//! Short-TTL decision cache (C2).
//!
//! Two independent caches share one implementation: a **hot dedup cache**
//! (TTL 60s, keyed by `(sessionKey, tool, sortedParamsJson)`) that lets the
//! synchronous hook path and the asynchronous streaming path share one LLM
//! result for the same tool call, and a **result cache** (TTL 1h, keyed on
//! the tool + action fingerprint) for cross-session reuse. Both are
//! capacity-bounded: on overflow, expired entries are evicted first, then
//! the oldest insertion-order entries until back under a low-water mark.
//!
//! Grounded in the `Arc<RwLock<HashMap<_, _>>>` + periodic-sweep shape used
//! for per-key rate-limiter state elsewhere in the workspace; generalized
//! here to two independently-TTL'd maps behind one lock each.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use guardrail_model::{Action, CacheEntry, Verdict};
use tokio::sync::RwLock;
use tracing::debug;

/// Soft capacity before the low-water eviction sweep kicks in.
const DEFAULT_CAPACITY: usize = 1000;
/// Target size after an eviction sweep.
const DEFAULT_LOW_WATER: usize = 800;

struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: ChronoDuration,
    capacity: usize,
    low_water: usize,
}

impl TtlCache {
    fn new(ttl: ChronoDuration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: DEFAULT_CAPACITY,
            low_water: DEFAULT_LOW_WATER,
        }
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Verdict> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.verdict.clone().with_cached(true))
    }

    async fn insert(&self, key: String, verdict: Verdict, now: DateTime<Utc>) {
        let expires_at = now + self.ttl;
        let entry = CacheEntry::new(key.clone(), verdict, expires_at, now);
        let mut entries = self.entries.write().await;
        entries.insert(key, entry);
        if entries.len() > self.capacity {
            Self::evict_locked(&mut entries, self.low_water, now);
        }
    }

    fn evict_locked(entries: &mut HashMap<String, CacheEntry>, low_water: usize, now: DateTime<Utc>) {
        entries.retain(|_, v| !v.is_expired(now));
        if entries.len() <= low_water {
            return;
        }
        let mut by_insertion: Vec<(String, DateTime<Utc>)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.inserted_at))
            .collect();
        by_insertion.sort_by_key(|(_, inserted_at)| *inserted_at);
        let to_remove = entries.len() - low_water;
        for (key, _) in by_insertion.into_iter().take(to_remove) {
            entries.remove(&key);
        }
    }

    async fn sweep(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired(now));
        if entries.len() > self.capacity {
            Self::evict_locked(&mut entries, self.low_water, now);
        }
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "decision cache sweep evicted entries");
        }
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// The two-tier decision cache described by C2.
pub struct DecisionCache {
    hot: TtlCache,
    result: TtlCache,
}

impl DecisionCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hot: TtlCache::new(ChronoDuration::seconds(60)),
            result: TtlCache::new(ChronoDuration::hours(1)),
        })
    }

    /// Look up a cached verdict for `action`. Always misses when
    /// `chain_context_present` is true — context-dependent results must
    /// not be reused across sessions. Checks the session-scoped hot cache
    /// first (dedupes the hook/streaming double-delivery of one call),
    /// then the cross-session result cache.
    pub async fn lookup(&self, action: &Action, chain_context_present: bool, now: DateTime<Utc>) -> Option<Verdict> {
        if chain_context_present {
            return None;
        }
        if let Some(v) = self.hot.get(&action.session_fingerprint(), now).await {
            return Some(v);
        }
        self.result.get(&action.fingerprint(), now).await
    }

    /// Insert a freshly-computed verdict into both tiers. No-op when
    /// `chain_context_present` is true.
    pub async fn insert(&self, action: &Action, verdict: Verdict, chain_context_present: bool, now: DateTime<Utc>) {
        if chain_context_present {
            return;
        }
        self.hot.insert(action.session_fingerprint(), verdict.clone(), now).await;
        self.result.insert(action.fingerprint(), verdict, now).await;
    }

    /// Periodic maintenance: evict expired entries from both tiers. Meant
    /// to be driven by a background timer (every 5 minutes per the
    /// workspace's cleanup convention).
    pub async fn sweep(&self, now: DateTime<Utc>) {
        self.hot.sweep(now).await;
        self.result.sweep(now).await;
    }

    pub async fn hot_len(&self) -> usize {
        self.hot.len().await
    }

    pub async fn result_len(&self) -> usize {
        self.result.len().await
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self {
            hot: TtlCache::new(ChronoDuration::seconds(60)),
            result: TtlCache::new(ChronoDuration::hours(1)),
        }
    }
}
