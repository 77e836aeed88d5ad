use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a pattern's accumulated history suggests doing with a future match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestedAction {
    Ask,
    AutoApprove,
    AutoDeny,
}

/// Aggregates every decision recorded for one generalized pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternRecord {
    pub pattern: String,
    pub tool: String,
    pub approve_count: u32,
    pub deny_count: u32,
    /// `(approve_count - 3*deny_count) / (approve_count + 3*deny_count)`,
    /// in `[-1, 1]`. Zero when there are no decisions yet.
    pub confidence: f64,
    pub last_seen: DateTime<Utc>,
    pub suggested_action: SuggestedAction,
}

impl PatternRecord {
    pub fn new(pattern: impl Into<String>, tool: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            pattern: pattern.into(),
            tool: tool.into(),
            approve_count: 0,
            deny_count: 0,
            confidence: 0.0,
            last_seen: now,
            suggested_action: SuggestedAction::Ask,
        }
    }

    /// Deny-weighted confidence: `(A - 3D) / (A + 3D)`, 3x penalty on
    /// denies since a single deny is a much stronger safety signal than a
    /// single approve.
    pub fn compute_confidence(approve_count: u32, deny_count: u32) -> f64 {
        let a = approve_count as f64;
        let d = deny_count as f64;
        let denom = a + 3.0 * d;
        if denom == 0.0 {
            0.0
        } else {
            (a - 3.0 * d) / denom
        }
    }

    /// `auto-approve` iff `A+D >= 3 && confidence > 0.7`;
    /// `auto-deny` iff `A+D >= 2 && confidence < -0.3`; otherwise `ask`.
    pub fn compute_suggested_action(approve_count: u32, deny_count: u32, confidence: f64) -> SuggestedAction {
        let total = approve_count + deny_count;
        if total >= 3 && confidence > 0.7 {
            SuggestedAction::AutoApprove
        } else if total >= 2 && confidence < -0.3 {
            SuggestedAction::AutoDeny
        } else {
            SuggestedAction::Ask
        }
    }

    /// Recompute `confidence` and `suggested_action` from the current
    /// counts, bumping `last_seen`. Call after mutating `approve_count`/
    /// `deny_count`.
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        self.confidence = Self::compute_confidence(self.approve_count, self.deny_count);
        self.suggested_action =
            Self::compute_suggested_action(self.approve_count, self.deny_count, self.confidence);
        self.last_seen = now;
    }

    pub fn total_decisions(&self) -> u32 {
        self.approve_count + self.deny_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_weighs_deny_three_times() {
        // 1 approve, 1 deny: (1 - 3)/(1 + 3) = -0.5
        assert_eq!(PatternRecord::compute_confidence(1, 1), -0.5);
        // no decisions: 0
        assert_eq!(PatternRecord::compute_confidence(0, 0), 0.0);
    }

    #[test]
    fn suggested_action_thresholds() {
        // 4 approves, 0 denies: confidence = 1.0, total=4 -> auto-approve
        let c = PatternRecord::compute_confidence(4, 0);
        assert_eq!(PatternRecord::compute_suggested_action(4, 0, c), SuggestedAction::AutoApprove);

        // 0 approves, 2 denies: confidence = -1.0, total=2 -> auto-deny
        let c = PatternRecord::compute_confidence(0, 2);
        assert_eq!(PatternRecord::compute_suggested_action(0, 2, c), SuggestedAction::AutoDeny);

        // 1 approve, 0 deny: confidence=1.0 but total=1 < 3 -> ask
        let c = PatternRecord::compute_confidence(1, 0);
        assert_eq!(PatternRecord::compute_suggested_action(1, 0, c), SuggestedAction::Ask);
    }
}
