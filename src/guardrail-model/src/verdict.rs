use serde::{Deserialize, Serialize};

/// The three-tier classification outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictKind {
    Safe,
    Warning,
    Block,
}

impl VerdictKind {
    /// The inclusive score band each verdict kind is allowed to report.
    pub fn band(self) -> (u8, u8) {
        match self {
            VerdictKind::Safe => (1, 2),
            VerdictKind::Warning => (3, 7),
            VerdictKind::Block => (8, 10),
        }
    }

    /// The verdict whose band contains `score`, clamping at the edges.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=2 => VerdictKind::Safe,
            3..=7 => VerdictKind::Warning,
            _ => VerdictKind::Block,
        }
    }
}

impl std::fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VerdictKind::Safe => "SAFE",
            VerdictKind::Warning => "WARNING",
            VerdictKind::Block => "BLOCK",
        };
        write!(f, "{s}")
    }
}

/// The full classification result returned by `guardrail-core::classify`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub verdict: VerdictKind,
    /// 1-10, must lie within `verdict.band()`.
    pub score: u8,
    /// One-sentence explanation.
    pub reason: String,
    /// Free-form classification tag, e.g. `destructive-file-op`, `exfiltration`.
    pub category: String,
    /// `verdict != BLOCK`.
    pub allowed: bool,
    /// Which component produced this verdict: `rules`, `cache`, `memory`,
    /// `llm:<model>`, `fallback`.
    pub backend: String,
    /// Set by the memory post-adjustment step when it changed the score.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memory_adjustment: Option<i8>,
    /// The pre-adjustment score, present only when an adjustment was applied.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_score: Option<u8>,
    /// Hallucination-guard annotations and any other non-fatal warnings.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set by the decision cache on a hit; hits do not count toward LLM
    /// call counters.
    #[serde(default)]
    pub cached: bool,
}

impl Verdict {
    pub fn new(
        verdict: VerdictKind,
        score: u8,
        reason: impl Into<String>,
        category: impl Into<String>,
        backend: impl Into<String>,
    ) -> Self {
        let allowed = verdict != VerdictKind::Block;
        Self {
            verdict,
            score,
            reason: reason.into(),
            category: category.into(),
            allowed,
            backend: backend.into(),
            memory_adjustment: None,
            original_score: None,
            warnings: Vec::new(),
            cached: false,
        }
    }

    pub fn safe(reason: impl Into<String>, category: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::new(VerdictKind::Safe, 1, reason, category, backend)
    }

    pub fn block(score: u8, reason: impl Into<String>, category: impl Into<String>, backend: impl Into<String>) -> Self {
        let score = score.clamp(8, 10);
        Self::new(VerdictKind::Block, score, reason, category, backend)
    }

    pub fn warning(score: u8, reason: impl Into<String>, category: impl Into<String>, backend: impl Into<String>) -> Self {
        let score = score.clamp(3, 7);
        Self::new(VerdictKind::Warning, score, reason, category, backend)
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Re-derive `verdict`/`allowed` from `score`'s band, recording the
    /// pre-adjustment values. Used by the memory post-adjustment step.
    pub fn apply_score_delta(mut self, delta: i8) -> Self {
        if delta == 0 {
            return self;
        }
        let original = self.score;
        let adjusted = (original as i16 + delta as i16).clamp(1, 10) as u8;
        self.original_score = Some(original);
        self.memory_adjustment = Some(delta);
        self.score = adjusted;
        self.verdict = VerdictKind::from_score(adjusted);
        self.allowed = self.verdict != VerdictKind::Block;
        self
    }

    /// `score` lies within `verdict`'s band and `allowed == (verdict != BLOCK)`.
    pub fn is_internally_consistent(&self) -> bool {
        let (lo, hi) = self.verdict.band();
        let score_ok = self.score >= lo && self.score <= hi;
        let allowed_ok = self.allowed == (self.verdict != VerdictKind::Block);
        score_ok && allowed_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_are_internally_consistent() {
        assert!(Verdict::safe("ok", "none", "rules").is_internally_consistent());
        assert!(Verdict::warning(5, "maybe", "cat", "rules").is_internally_consistent());
        assert!(Verdict::block(10, "no", "cat", "rules").is_internally_consistent());
    }

    #[test]
    fn apply_score_delta_rebands_verdict() {
        let v = Verdict::block(8, "x", "y", "llm:auto").apply_score_delta(-2);
        assert_eq!(v.score, 6);
        assert_eq!(v.verdict, VerdictKind::Warning);
        assert!(v.allowed);
        assert_eq!(v.original_score, Some(8));
        assert_eq!(v.memory_adjustment, Some(-2));
    }

    #[test]
    fn zero_delta_is_noop() {
        let v = Verdict::safe("x", "y", "rules");
        let v2 = v.clone().apply_score_delta(0);
        assert_eq!(v, v2);
    }
}
