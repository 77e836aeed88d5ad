//! OS-aware path detection for guardrail's on-disk state.
//!
//! - **Windows**: `%APPDATA%\Guardrail\`
//! - **macOS**: `~/Library/Application Support/Guardrail/`
//! - **Linux**: `~/.local/share/Guardrail/`
//!
//! All locations are overridable with `GUARDRAIL_DATA_DIR`, which is the
//! recommended way to point guardrail at a writable volume inside a
//! read-only container.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Application name used for the storage directory.
pub const APP_NAME: &str = "Guardrail";

/// Subdirectory names.
pub const MEMORY_DIR: &str = "memory";
pub const EVENTS_DIR: &str = "events";
pub const CACHE_DIR: &str = "cache";
pub const LOGS_DIR: &str = "logs";

/// Names of the two pattern-memory files inside [`GuardrailPaths::memory_dir`].
pub const DECISIONS_LOG_FILE: &str = "decisions.jsonl";
pub const PATTERNS_FILE: &str = "patterns.json";

/// Name of the event log file inside [`GuardrailPaths::events_dir`].
pub const EVENTS_LOG_FILE: &str = "events.jsonl";

/// Resolved on-disk layout for guardrail's persisted state.
#[derive(Debug, Clone)]
pub struct GuardrailPaths {
    /// Root data directory (platform-specific, or `GUARDRAIL_DATA_DIR`).
    pub data_dir: PathBuf,
    /// Pattern-memory directory: `decisions.jsonl` + `patterns.json`.
    pub memory_dir: PathBuf,
    /// Event log directory.
    pub events_dir: PathBuf,
    /// Cache directory (not used for durable state, kept for parity with
    /// the platform convention used elsewhere in the workspace).
    pub cache_dir: PathBuf,
    /// Logs directory.
    pub logs_dir: PathBuf,
}

impl GuardrailPaths {
    /// Resolve paths using automatic OS detection (or env override).
    pub fn new() -> Result<Self> {
        let data_dir = guardrail_data_dir()?;
        Ok(Self::from_root(data_dir))
    }

    /// Build paths rooted at an explicit directory (tests, custom setups).
    pub fn from_root(data_dir: PathBuf) -> Self {
        Self {
            memory_dir: data_dir.join(MEMORY_DIR),
            events_dir: data_dir.join(EVENTS_DIR),
            cache_dir: data_dir.join(CACHE_DIR),
            logs_dir: data_dir.join(LOGS_DIR),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.memory_dir)?;
        std::fs::create_dir_all(&self.events_dir)?;
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        debug!(data_dir = %self.data_dir.display(), "guardrail storage directories initialized");
        Ok(())
    }

    /// Ensure all directories exist (async version).
    pub async fn ensure_dirs_async(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::create_dir_all(&self.memory_dir).await?;
        tokio::fs::create_dir_all(&self.events_dir).await?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::create_dir_all(&self.logs_dir).await?;
        debug!(data_dir = %self.data_dir.display(), "guardrail storage directories initialized");
        Ok(())
    }

    /// Path to the append-only decision log (the write-ahead log for
    /// pattern memory).
    pub fn decisions_log_path(&self) -> PathBuf {
        self.memory_dir.join(DECISIONS_LOG_FILE)
    }

    /// Path to the materialized pattern-memory view.
    pub fn patterns_path(&self) -> PathBuf {
        self.memory_dir.join(PATTERNS_FILE)
    }

    /// Path to the event log.
    pub fn events_log_path(&self) -> PathBuf {
        self.events_dir.join(EVENTS_LOG_FILE)
    }
}

impl Default for GuardrailPaths {
    fn default() -> Self {
        Self::new().expect("failed to determine guardrail storage paths")
    }
}

/// Get the guardrail data directory based on the current OS.
pub fn guardrail_data_dir() -> Result<PathBuf> {
    if let Ok(val) = std::env::var("GUARDRAIL_DATA_DIR") {
        if !val.is_empty() {
            let path = PathBuf::from(val);
            debug!(path = %path.display(), "using GUARDRAIL_DATA_DIR override");
            return Ok(path);
        }
    }

    let base = dirs::data_dir().ok_or(StoreError::HomeDirNotFound)?;
    Ok(base.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardrail_data_dir_override() {
        std::env::set_var("GUARDRAIL_DATA_DIR", "/tmp/guardrail-test-xyz");
        let path = guardrail_data_dir().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/guardrail-test-xyz"));
        std::env::remove_var("GUARDRAIL_DATA_DIR");
    }

    #[test]
    fn test_paths_structure() {
        let paths = GuardrailPaths::from_root(PathBuf::from("/tmp/guardrail-root"));
        assert!(paths.memory_dir.ends_with(MEMORY_DIR));
        assert!(paths.events_dir.ends_with(EVENTS_DIR));
        assert_eq!(
            paths.decisions_log_path(),
            PathBuf::from("/tmp/guardrail-root/memory/decisions.jsonl")
        );
        assert_eq!(
            paths.patterns_path(),
            PathBuf::from("/tmp/guardrail-root/memory/patterns.json")
        );
        assert_eq!(
            paths.events_log_path(),
            PathBuf::from("/tmp/guardrail-root/events/events.jsonl")
        );
    }
}
