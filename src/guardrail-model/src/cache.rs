use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Verdict;

/// One entry in the decision cache: a cached verdict for an action
/// fingerprint, with an expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub verdict: Verdict,
    pub expires_at: DateTime<Utc>,
    /// Insertion order key for FIFO eviction once expired entries are gone.
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(fingerprint: impl Into<String>, verdict: Verdict, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            verdict,
            expires_at,
            inserted_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
