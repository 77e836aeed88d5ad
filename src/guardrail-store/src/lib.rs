//! Durable, crash-safe persistence primitives shared by guardrail's
//! pattern memory and event log.
//!
//! - **Windows**: `%APPDATA%\Guardrail\`
//! - **macOS**: `~/Library/Application Support/Guardrail/`
//! - **Linux**: `~/.local/share/Guardrail/`
//!
//! Two primitives cover every durable table guardrail keeps:
//!
//! - [`JsonlStore`] — an append-only, line-delimited JSON log, fsync'd on
//!   every append. This is the write-ahead log for pattern memory
//!   (`decisions.jsonl`) and the backing store for the event log
//!   (`events.jsonl`).
//! - [`JsonStore`] — a single JSON document, atomically replaced
//!   (write-temp, fsync, rename) on every save. This is the materialized,
//!   recomputable-from-the-log view (`patterns.json`).
//!
//! ```rust,no_run
//! use guardrail_store::{GuardrailPaths, JsonlStore};
//!
//! #[tokio::main]
//! async fn main() -> guardrail_store::Result<()> {
//!     let paths = GuardrailPaths::new()?;
//!     paths.ensure_dirs_async().await?;
//!
//!     let log: JsonlStore<serde_json::Value> = JsonlStore::new(paths.decisions_log_path());
//!     log.append(&serde_json::json!({"tool": "exec"})).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod json;
pub mod jsonl;
pub mod paths;

pub use error::{Result, StoreError};
pub use json::JsonStore;
pub use jsonl::JsonlStore;
pub use paths::{guardrail_data_dir, GuardrailPaths};
