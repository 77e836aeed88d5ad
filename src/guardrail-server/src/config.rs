//! Runtime configuration for the guardrail hook/event ingestor.
//!
//! Mirrors the teacher's `ServerConfig::from_env`/`ServerConfig::load`
//! shape: every setting has an environment-variable name and a default,
//! and a JSON file can override the whole set at once.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Full set of spec.md §6 configuration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// When false, hooks always respond `allow` regardless of verdict
    /// ("monitor mode").
    pub blocking_enabled: bool,
    /// On hook-internal errors, deny dangerous tool categories instead of
    /// the normal-mode default of `allow`.
    pub fail_closed: bool,
    /// Verdicts at or below this score auto-`allow`.
    pub auto_allow_threshold: u8,
    /// Verdicts at or above this score auto-`deny`.
    pub auto_block_threshold: u8,
    pub llm_backend_url: String,
    /// Model id, or `"auto"` to have the judge resolve one from `/models`.
    pub llm_model: String,
    pub llm_timeout_ms: u64,
    /// Poll interval for the (currently in-process) streaming gateway
    /// ingestor.
    pub poll_interval_ms: u64,
    /// Event-log cap; oldest events are pruned past this count.
    pub max_events: usize,
    /// Tool-history ring length per session.
    pub max_tool_history: usize,
    /// Listen address for the hook/approval HTTP API.
    pub listen_addr: String,
    /// 1-in-N sampling of otherwise-auto-allowed WARNING verdicts routed
    /// to a human `ask` for feedback collection instead. 0 disables
    /// sampling. A counter-based modulus rather than true randomness, so
    /// sampling is deterministic and testable.
    pub warning_sample_rate: u32,
    pub shutdown_timeout_secs: u64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            blocking_enabled: true,
            fail_closed: false,
            auto_allow_threshold: 6,
            auto_block_threshold: 9,
            llm_backend_url: guardrail_llm::DEFAULT_BACKEND_URL.to_string(),
            llm_model: "auto".to_string(),
            llm_timeout_ms: 30_000,
            poll_interval_ms: 30_000,
            max_events: 10_000,
            max_tool_history: 10,
            listen_addr: "0.0.0.0:8765".to_string(),
            warning_sample_rate: 0,
            shutdown_timeout_secs: 10,
        }
    }
}

impl GuardrailConfig {
    /// Load every setting from its environment variable, falling back to
    /// the default when unset or unparseable.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            blocking_enabled: env_bool("BLOCKING_ENABLED", defaults.blocking_enabled),
            fail_closed: env_bool("FAIL_CLOSED", defaults.fail_closed),
            auto_allow_threshold: env_u8("AUTO_ALLOW_THRESHOLD", defaults.auto_allow_threshold),
            auto_block_threshold: env_u8("AUTO_BLOCK_THRESHOLD", defaults.auto_block_threshold),
            llm_backend_url: env_string("LLM_BACKEND_URL", &defaults.llm_backend_url),
            llm_model: env_string("LLM_MODEL", &defaults.llm_model),
            llm_timeout_ms: env_u64("LLM_TIMEOUT_MS", defaults.llm_timeout_ms),
            poll_interval_ms: env_u64("POLL_INTERVAL_MS", defaults.poll_interval_ms),
            max_events: env_u32("MAX_EVENTS", defaults.max_events as u32) as usize,
            max_tool_history: env_u32("MAX_TOOL_HISTORY", defaults.max_tool_history as u32) as usize,
            listen_addr: env_string("GUARDRAIL_LISTEN_ADDR", &defaults.listen_addr),
            warning_sample_rate: env_u32("WARNING_SAMPLE_RATE", defaults.warning_sample_rate),
            shutdown_timeout_secs: env_u64("SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs),
        })
    }

    /// Load a JSON override file, falling back to documented defaults for
    /// any field the file omits.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let data = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::BadRequest(format!("failed to read config file: {e}")))?;
        serde_json::from_str(&data).map_err(|e| AppError::Validation(format!("invalid config JSON: {e}")))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = GuardrailConfig::default();
        assert_eq!(cfg.auto_allow_threshold, 6);
        assert_eq!(cfg.auto_block_threshold, 9);
        assert_eq!(cfg.max_events, 10_000);
        assert_eq!(cfg.max_tool_history, 10);
    }

    #[test]
    fn load_parses_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"blocking_enabled": false, "auto_allow_threshold": 4}"#).unwrap();
        let cfg = GuardrailConfig::load(&path).unwrap();
        assert!(!cfg.blocking_enabled);
        assert_eq!(cfg.auto_allow_threshold, 4);
        // Omitted fields fall back to `Default`, not zeroed out.
        assert_eq!(cfg.auto_block_threshold, 9);
    }
}
