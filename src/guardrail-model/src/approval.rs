use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Action, Verdict};

/// How a pending approval was resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalResolution {
    Approve,
    Deny,
    /// Also records a strong positive signal in memory and forces the
    /// pattern's `suggested_action` to `auto-approve`.
    AlwaysApprove,
}

/// Current state of a [`PendingApproval`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalStatus {
    Created,
    Approved,
    Denied,
    TimedOut,
    OrphanedByRestart,
}

/// A suspended approval request, created whenever the synchronous hook
/// path sees a WARNING/BLOCK verdict and needs a human resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingApproval {
    pub id: Uuid,
    pub action: Action,
    pub verdict: Verdict,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
}

impl PendingApproval {
    pub fn new(action: Action, verdict: Verdict, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            verdict,
            status: ApprovalStatus::Created,
            created_at: now,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self.status, ApprovalStatus::Created)
    }
}
