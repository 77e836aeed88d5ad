use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's resolution of one classified action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Approve,
    Deny,
    Neutral,
}

/// A single persisted row in the append-only decision log.
///
/// `decisions.jsonl` is the write-ahead log for pattern memory: replaying
/// every `DecisionRecord` in append order into an empty `PatternRecord`
/// table must reproduce identical final patterns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    /// The raw parameter fingerprint, e.g. command line or JSON.
    pub command_str: String,
    /// Generalized form, see `guardrail_memory::pattern`.
    pub pattern: String,
    /// The classifier's score at decision time.
    pub score: u8,
    pub decision: DecisionKind,
    pub session_key: String,
}

impl DecisionRecord {
    pub fn new(
        tool: impl Into<String>,
        command_str: impl Into<String>,
        pattern: impl Into<String>,
        score: u8,
        decision: DecisionKind,
        session_key: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            tool: tool.into(),
            command_str: command_str.into(),
            pattern: pattern.into(),
            score,
            decision,
            session_key: session_key.into(),
        }
    }
}
