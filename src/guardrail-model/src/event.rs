use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Verdict;

/// Which ingestion path produced an [`EventRecord`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSubType {
    PreToolUse,
    PostToolUse,
    UserPrompt,
    Stop,
    Streaming,
}

/// A self-contained row in the append-only event log. The verdict is
/// copied in full (not referenced) so the log remains readable on its own
/// even if pattern memory is later rebuilt or pruned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub sub_type: EventSubType,
    pub session_key: String,
    pub verdict: Verdict,
    pub action_summary: String,
    /// True for the synchronous hook event when both the hook and the
    /// streaming path observed the same call; the streaming path's event
    /// for the same fingerprint is tagged `false` and never overwrites
    /// the hook's persisted verdict.
    #[serde(default = "default_true")]
    pub authoritative: bool,
}

fn default_true() -> bool {
    true
}

impl EventRecord {
    pub fn new(
        tool: impl Into<String>,
        sub_type: EventSubType,
        session_key: impl Into<String>,
        verdict: Verdict,
        action_summary: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            tool: tool.into(),
            sub_type,
            session_key: session_key.into(),
            verdict,
            action_summary: action_summary.into(),
            authoritative: true,
        }
    }

    pub fn non_authoritative(mut self) -> Self {
        self.authoritative = false;
        self
    }
}
