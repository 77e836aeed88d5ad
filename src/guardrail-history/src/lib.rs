//! Per-session tool-call history tracker (C4).
//!
//! Keeps a bounded ring buffer of the last `max_entries` tool calls per
//! session, used as chain-risk context for exit-type tools (`exec`,
//! `message`, `sessions_send`, `sessions_spawn`) — the tools capable of
//! carrying data out of the machine. Reads alone never get chain context;
//! chain risk only matters once data is about to leave.
//!
//! Ordering within one `sessionKey` is maintained by a per-session lock:
//! `record` and `chain_context` for the same session always serialize, so
//! a later classification's context reflects the agent's actual execution
//! order. Cross-session calls run fully concurrently — each session gets
//! its own `Mutex`, taken only after a brief shared lookup in the outer
//! map, so one busy session never blocks another.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use guardrail_model::{is_exit_type_tool, ToolHistoryEntry};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Default ring length per session, per spec `MAX_TOOL_HISTORY`.
pub const DEFAULT_MAX_ENTRIES: usize = 10;
/// Sessions idle longer than this are evicted wholesale on sweep.
pub const SESSION_IDLE_TIMEOUT: ChronoDuration = ChronoDuration::hours(2);

struct SessionRing {
    entries: VecDeque<ToolHistoryEntry>,
    last_activity: DateTime<Utc>,
}

impl SessionRing {
    fn new(now: DateTime<Utc>) -> Self {
        Self { entries: VecDeque::new(), last_activity: now }
    }
}

/// The tool-call history tracker.
pub struct ToolHistoryTracker {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionRing>>>>,
    max_entries: usize,
}

impl ToolHistoryTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    async fn ring_for(&self, session_key: &str, now: DateTime<Utc>) -> Arc<Mutex<SessionRing>> {
        if let Some(ring) = self.sessions.read().await.get(session_key) {
            return Arc::clone(ring);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionRing::new(now)))),
        )
    }

    /// Record one completed tool call. Evicts the oldest entry FIFO once
    /// the ring is at capacity.
    pub async fn record(
        &self,
        session_key: &str,
        tool: &str,
        params: std::collections::BTreeMap<String, Value>,
        result: &Value,
        now: DateTime<Utc>,
    ) {
        let ring = self.ring_for(session_key, now).await;
        let mut ring = ring.lock().await;
        ring.entries.push_back(ToolHistoryEntry::new(tool, params, result, now));
        while ring.entries.len() > self.max_entries {
            ring.entries.pop_front();
        }
        ring.last_activity = now;
    }

    /// The full ring for `session_key`, but only when `current_tool` is an
    /// exit-type tool; otherwise empty (and a non-exit-type lookup never
    /// touches the session's lock at all).
    pub async fn chain_context(&self, session_key: &str, current_tool: &str, now: DateTime<Utc>) -> Vec<ToolHistoryEntry> {
        if !is_exit_type_tool(current_tool) {
            return Vec::new();
        }
        let Some(ring) = self.sessions.read().await.get(session_key).cloned() else {
            return Vec::new();
        };
        let mut ring = ring.lock().await;
        ring.last_activity = now;
        ring.entries.iter().cloned().collect()
    }

    /// Evict sessions idle longer than [`SESSION_IDLE_TIMEOUT`]. Meant to
    /// be driven by the same 5-minute background timer as the decision
    /// cache sweep.
    pub async fn sweep_idle_sessions(&self, now: DateTime<Utc>) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let mut stale = Vec::new();
        for (key, ring) in sessions.iter() {
            let ring = ring.lock().await;
            if now - ring.last_activity > SESSION_IDLE_TIMEOUT {
                stale.push(key.clone());
            }
        }
        for key in &stale {
            sessions.remove(key);
        }
        if !stale.is_empty() {
            debug!(evicted = stale.len(), remaining = sessions.len(), before, "evicted idle tool-history sessions");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for ToolHistoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn chain_context_empty_for_non_exit_tool() {
        let tracker = ToolHistoryTracker::new();
        let now = Utc::now();
        tracker.record("s1", "exec", BTreeMap::new(), &json!("ok"), now).await;
        assert!(tracker.chain_context("s1", "read", now).await.is_empty());
    }

    #[tokio::test]
    async fn chain_context_present_for_exit_tool_after_activity() {
        let tracker = ToolHistoryTracker::new();
        let now = Utc::now();
        tracker.record("s1", "read", BTreeMap::new(), &json!("secret contents"), now).await;
        let ctx = tracker.chain_context("s1", "exec", now).await;
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx[0].tool, "read");
    }

    #[tokio::test]
    async fn ring_evicts_fifo_past_capacity() {
        let tracker = ToolHistoryTracker::with_capacity(3);
        let now = Utc::now();
        for i in 0..5 {
            tracker.record("s1", "read", BTreeMap::new(), &json!(format!("call-{i}")), now).await;
        }
        let ctx = tracker.chain_context("s1", "exec", now).await;
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx[0].result_snippet, "call-2");
        assert_eq!(ctx[2].result_snippet, "call-4");
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let tracker = ToolHistoryTracker::new();
        let now = Utc::now();
        tracker.record("s1", "read", BTreeMap::new(), &json!("a"), now).await;
        tracker.record("s2", "read", BTreeMap::new(), &json!("b"), now).await;
        assert_eq!(tracker.chain_context("s1", "exec", now).await.len(), 1);
        assert_eq!(tracker.chain_context("s2", "exec", now).await.len(), 1);
        assert_eq!(tracker.session_count().await, 2);
    }

    #[tokio::test]
    async fn idle_sessions_are_swept() {
        let tracker = ToolHistoryTracker::new();
        let now = Utc::now();
        tracker.record("s1", "read", BTreeMap::new(), &json!("a"), now).await;
        assert_eq!(tracker.session_count().await, 1);

        let later = now + SESSION_IDLE_TIMEOUT + ChronoDuration::minutes(1);
        tracker.sweep_idle_sessions(later).await;
        assert_eq!(tracker.session_count().await, 0);
    }

    #[tokio::test]
    async fn active_sessions_survive_sweep() {
        let tracker = ToolHistoryTracker::new();
        let now = Utc::now();
        tracker.record("s1", "read", BTreeMap::new(), &json!("a"), now).await;
        let soon = now + ChronoDuration::minutes(30);
        tracker.sweep_idle_sessions(soon).await;
        assert_eq!(tracker.session_count().await, 1);
    }
}
