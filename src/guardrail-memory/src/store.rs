//! Crash-safe pattern memory: an append-only decision log plus a
//! recomputable materialized view of per-pattern aggregates.
//!
//! `decisions.jsonl` is the write-ahead log; `patterns.json` is derived
//! from it and could in principle be discarded and rebuilt by replaying
//! the log (`rebuild_from_log`), which is exactly how this type loads on
//! startup — that is what makes "replaying a decision log into an empty
//! memory store reproduces identical final patterns" true by construction
//! rather than by careful bookkeeping.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use guardrail_model::{DecisionKind, DecisionRecord, PatternRecord, SuggestedAction};
use guardrail_store::{GuardrailPaths, JsonStore, JsonlStore, Result as StoreResult};
use tokio::sync::Mutex;
use tracing::warn;

use crate::pattern::pattern as extract_pattern;

/// How many recent decisions are kept in memory per pattern for the
/// `recentDecisions` field returned by [`PatternMemory::lookup`].
const RECENT_DECISIONS_PER_PATTERN: usize = 20;

/// Result of looking up a pattern's accumulated history.
#[derive(Debug, Clone)]
pub struct PatternLookup {
    pub found: bool,
    pub pattern: String,
    pub approve_count: u32,
    pub deny_count: u32,
    pub confidence: f64,
    pub suggested_action: SuggestedAction,
    pub last_seen: Option<DateTime<Utc>>,
    pub recent_decisions: Vec<DecisionRecord>,
}

impl PatternLookup {
    fn not_found(pattern: String) -> Self {
        Self {
            found: false,
            pattern,
            approve_count: 0,
            deny_count: 0,
            confidence: 0.0,
            suggested_action: SuggestedAction::Ask,
            last_seen: None,
            recent_decisions: Vec::new(),
        }
    }

    pub fn total_decisions(&self) -> u32 {
        self.approve_count + self.deny_count
    }
}

struct MemoryState {
    patterns: BTreeMap<String, PatternRecord>,
    recent_decisions: BTreeMap<String, VecDeque<DecisionRecord>>,
}

impl MemoryState {
    fn new() -> Self {
        Self {
            patterns: BTreeMap::new(),
            recent_decisions: BTreeMap::new(),
        }
    }

    fn apply(&mut self, record: &DecisionRecord) {
        let entry = self
            .patterns
            .entry(record.pattern.clone())
            .or_insert_with(|| PatternRecord::new(record.pattern.clone(), record.tool.clone(), record.timestamp));

        match record.decision {
            DecisionKind::Approve => entry.approve_count += 1,
            DecisionKind::Deny => entry.deny_count += 1,
            DecisionKind::Neutral => {}
        }
        entry.recompute(record.timestamp);

        let ring = self.recent_decisions.entry(record.pattern.clone()).or_default();
        ring.push_back(record.clone());
        while ring.len() > RECENT_DECISIONS_PER_PATTERN {
            ring.pop_front();
        }
    }
}

/// Pattern-learning memory store (C3).
pub struct PatternMemory {
    decisions_log: JsonlStore<DecisionRecord>,
    patterns_store: JsonStore<BTreeMap<String, PatternRecord>>,
    state: Mutex<MemoryState>,
}

impl PatternMemory {
    /// Load pattern memory from `paths`, replaying the decision log to
    /// build the in-memory pattern table (and re-persisting it as the
    /// fresh materialized view).
    pub async fn load(paths: &GuardrailPaths) -> StoreResult<Self> {
        let memory = Self {
            decisions_log: JsonlStore::new(paths.decisions_log_path()),
            patterns_store: JsonStore::new(paths.patterns_path()),
            state: Mutex::new(MemoryState::new()),
        };
        memory.rebuild_from_log().await?;
        Ok(memory)
    }

    /// In-memory only, for tests: no decision log or patterns file on
    /// disk backs this instance until `decisions_log`/`patterns_store`
    /// paths are provided via [`Self::load`].
    #[cfg(test)]
    fn in_memory(dir: &std::path::Path) -> Self {
        Self {
            decisions_log: JsonlStore::new(dir.join("decisions.jsonl")),
            patterns_store: JsonStore::new(dir.join("patterns.json")),
            state: Mutex::new(MemoryState::new()),
        }
    }

    /// Clear the in-memory pattern table and replay every record in the
    /// decision log in append order, then persist the rebuilt patterns.
    pub async fn rebuild_from_log(&self) -> StoreResult<()> {
        let records = self.decisions_log.read_all().await?;
        let mut state = self.state.lock().await;
        *state = MemoryState::new();
        for record in &records {
            state.apply(record);
        }
        self.patterns_store.save(&state.patterns).await?;
        Ok(())
    }

    /// The pure pattern-extraction function, exposed for callers that
    /// need to compute a pattern before recording a decision.
    pub fn pattern(tool: &str, command_str: &str) -> String {
        extract_pattern(tool, command_str)
    }

    /// Insert a `DecisionRecord` and atomically upsert the corresponding
    /// `PatternRecord`. The decision log append and the pattern-table
    /// mutation happen under the same lock so concurrent decisions on the
    /// same pattern serialize.
    pub async fn record_decision(
        &self,
        tool: &str,
        command_str: &str,
        score: u8,
        decision: DecisionKind,
        session_key: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<PatternRecord> {
        let pattern = extract_pattern(tool, command_str);
        let record = DecisionRecord::new(tool, command_str, pattern.clone(), score, decision, session_key, now);

        let mut state = self.state.lock().await;
        self.decisions_log.append(&record).await?;
        state.apply(&record);
        let updated = state.patterns.get(&pattern).cloned();
        if let Err(err) = self.patterns_store.save(&state.patterns).await {
            warn!(error = %err, "failed to persist pattern-memory materialized view");
        }

        Ok(updated.expect("pattern was just inserted"))
    }

    /// `always-approve` resolution: force the pattern's `suggested_action`
    /// to `auto-approve` regardless of what the confidence math says.
    pub async fn force_auto_approve(&self, tool: &str, command_str: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let pattern = extract_pattern(tool, command_str);
        let mut state = self.state.lock().await;
        let entry = state
            .patterns
            .entry(pattern.clone())
            .or_insert_with(|| PatternRecord::new(pattern, tool, now));
        entry.suggested_action = SuggestedAction::AutoApprove;
        entry.last_seen = now;
        self.patterns_store.save(&state.patterns).await?;
        Ok(())
    }

    pub async fn lookup(&self, pattern: &str) -> PatternLookup {
        let state = self.state.lock().await;
        let Some(record) = state.patterns.get(pattern) else {
            return PatternLookup::not_found(pattern.to_string());
        };
        let recent = state
            .recent_decisions
            .get(pattern)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default();
        PatternLookup {
            found: true,
            pattern: pattern.to_string(),
            approve_count: record.approve_count,
            deny_count: record.deny_count,
            confidence: record.confidence,
            suggested_action: record.suggested_action,
            last_seen: Some(record.last_seen),
            recent_decisions: recent,
        }
    }

    /// Up to `k` patterns most similar to `pattern` (same tool,
    /// substring/prefix overlap) used only to assemble textual memory
    /// context for the prompt. Never used to short-circuit a decision.
    pub async fn related_lookup(&self, tool: &str, pattern: &str, k: usize) -> Vec<PatternRecord> {
        let state = self.state.lock().await;
        let mut candidates: Vec<PatternRecord> = state
            .patterns
            .values()
            .filter(|p| p.tool == tool && p.pattern != pattern)
            .filter(|p| overlaps(&p.pattern, pattern))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.total_decisions().cmp(&a.total_decisions()));
        candidates.truncate(k);
        candidates
    }

    /// Score adjustment per the memory confidence formula. Returns an
    /// integer delta in `[-3, 2]`. Hard bounds: never adjust when
    /// `raw_score >= 9`; never let `raw_score + delta < 3`; delta is 0 if
    /// fewer than 3 total decisions are on record for this pattern.
    pub async fn score_adjustment(&self, pattern: &str, raw_score: u8, now: DateTime<Utc>) -> i8 {
        if raw_score >= 9 {
            return 0;
        }
        let state = self.state.lock().await;
        let Some(record) = state.patterns.get(pattern) else {
            return 0;
        };
        if record.total_decisions() < 3 {
            return 0;
        }

        let age_days = (now - record.last_seen).num_days().max(0) as f64;
        let decay = (1.0 - age_days / 30.0).max(0.0);
        let confidence = record.confidence;

        let raw_delta = if confidence > 0.5 {
            -(3.0 * confidence * decay).floor()
        } else if confidence < -0.3 {
            (2.0 * confidence.abs() * decay).floor()
        } else {
            0.0
        };

        let mut delta = raw_delta as i64;
        delta = delta.clamp(-3, 2);
        let floor = 3i64 - raw_score as i64;
        if delta < 0 {
            delta = delta.max(floor);
        }
        delta as i8
    }

    /// True if the pattern's history says `auto-approve`, a nominal
    /// mid-band baseline score adjusted by the memory would stay below
    /// the BLOCK threshold, and blocking is enabled. The orchestrator
    /// uses this to skip the LLM entirely.
    pub async fn auto_approve_eligible(&self, pattern: &str, blocking_enabled: bool, now: DateTime<Utc>) -> bool {
        if !blocking_enabled {
            return false;
        }
        const BASELINE_SCORE: u8 = 5;
        let lookup = self.lookup(pattern).await;
        if lookup.suggested_action != SuggestedAction::AutoApprove {
            return false;
        }
        let delta = self.score_adjustment(pattern, BASELINE_SCORE, now).await;
        let adjusted = (BASELINE_SCORE as i16 + delta as i16).clamp(1, 10);
        adjusted < 9
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    a.starts_with(b) || b.starts_with(a) || a.contains(b) || b.contains(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn four_approvals_reach_auto_approve_suggested_action() {
        let dir = tempdir().unwrap();
        let mem = PatternMemory::in_memory(dir.path());
        let now = Utc::now();

        for i in 0..4 {
            mem.record_decision(
                "exec",
                "git push origin main",
                5,
                DecisionKind::Approve,
                "s1",
                now + Duration::hours(i),
            )
            .await
            .unwrap();
        }

        let pattern = PatternMemory::pattern("exec", "git push origin main");
        let lookup = mem.lookup(&pattern).await;
        assert_eq!(lookup.suggested_action, SuggestedAction::AutoApprove);
        assert!(lookup.confidence > 0.7);
        assert!(mem.auto_approve_eligible(&pattern, true, now + Duration::hours(5)).await);
    }

    #[tokio::test]
    async fn never_adjusts_when_raw_score_at_or_above_nine() {
        let dir = tempdir().unwrap();
        let mem = PatternMemory::in_memory(dir.path());
        let now = Utc::now();
        for _ in 0..4 {
            mem.record_decision("exec", "rm -rf /tmp/x", 9, DecisionKind::Approve, "s1", now)
                .await
                .unwrap();
        }
        let pattern = PatternMemory::pattern("exec", "rm -rf /tmp/x");
        assert_eq!(mem.score_adjustment(&pattern, 9, now).await, 0);
        assert_eq!(mem.score_adjustment(&pattern, 10, now).await, 0);
    }

    #[tokio::test]
    async fn adjustment_never_pushes_score_below_three() {
        let dir = tempdir().unwrap();
        let mem = PatternMemory::in_memory(dir.path());
        let now = Utc::now();
        for _ in 0..5 {
            mem.record_decision("exec", "ls /tmp", 3, DecisionKind::Approve, "s1", now)
                .await
                .unwrap();
        }
        let pattern = PatternMemory::pattern("exec", "ls /tmp");
        let delta = mem.score_adjustment(&pattern, 3, now).await;
        assert!(3i16 + delta as i16 >= 3);
    }

    #[tokio::test]
    async fn fewer_than_three_decisions_gives_zero_delta() {
        let dir = tempdir().unwrap();
        let mem = PatternMemory::in_memory(dir.path());
        let now = Utc::now();
        mem.record_decision("exec", "ls /tmp", 5, DecisionKind::Approve, "s1", now)
            .await
            .unwrap();
        let pattern = PatternMemory::pattern("exec", "ls /tmp");
        assert_eq!(mem.score_adjustment(&pattern, 5, now).await, 0);
    }

    #[tokio::test]
    async fn rebuild_from_log_reproduces_identical_patterns() {
        let dir = tempdir().unwrap();
        let paths = GuardrailPaths::from_root(dir.path().to_path_buf());
        paths.ensure_dirs_async().await.unwrap();
        let mem = PatternMemory::load(&paths).await.unwrap();
        let now = Utc::now();

        for i in 0..4 {
            mem.record_decision("exec", "git push origin main", 5, DecisionKind::Approve, "s1", now + Duration::hours(i))
                .await
                .unwrap();
        }
        mem.record_decision("exec", "git push origin main", 4, DecisionKind::Deny, "s1", now + Duration::hours(5))
            .await
            .unwrap();

        let pattern = PatternMemory::pattern("exec", "git push origin main");
        let before = mem.lookup(&pattern).await;

        let replayed = PatternMemory::load(&paths).await.unwrap();
        let after = replayed.lookup(&pattern).await;

        assert_eq!(before.approve_count, after.approve_count);
        assert_eq!(before.deny_count, after.deny_count);
        assert_eq!(before.confidence, after.confidence);
        assert_eq!(before.suggested_action, after.suggested_action);
    }

    #[tokio::test]
    async fn force_auto_approve_overrides_confidence_math() {
        let dir = tempdir().unwrap();
        let mem = PatternMemory::in_memory(dir.path());
        let now = Utc::now();
        mem.force_auto_approve("exec", "rm -rf /tmp/scratch", now).await.unwrap();
        let pattern = PatternMemory::pattern("exec", "rm -rf /tmp/scratch");
        let lookup = mem.lookup(&pattern).await;
        assert_eq!(lookup.suggested_action, SuggestedAction::AutoApprove);
    }
}
