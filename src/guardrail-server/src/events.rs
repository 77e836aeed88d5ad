//! Event log (part of C8): every hook/streaming classification is
//! appended here, and a read-only query API serves it back by session,
//! score band, or time window.
//!
//! Grounded in [`guardrail_store::JsonlStore`]'s append-only WAL shape;
//! this module adds the in-memory recent-events window and the periodic
//! prune-to-`max_events` pass spec.md §4.8 calls for, neither of which
//! belongs in the generic store primitive.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use guardrail_model::{EventRecord, VerdictKind};
use guardrail_store::{GuardrailPaths, JsonlStore, Result as StoreResult};
use serde::Deserialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub struct EventStore {
    log: JsonlStore<EventRecord>,
    recent: RwLock<VecDeque<EventRecord>>,
    max_events: usize,
}

impl EventStore {
    /// Load the existing log (if any) into memory, keeping at most
    /// `max_events` of its newest rows.
    pub async fn load(paths: &GuardrailPaths, max_events: usize) -> StoreResult<Self> {
        let log = JsonlStore::new(paths.events_log_path());
        let mut rows = log.read_all().await?;
        if rows.len() > max_events {
            rows.drain(0..rows.len() - max_events);
        }
        Ok(Self { log, recent: RwLock::new(rows.into()), max_events })
    }

    /// Append one event. A failure here is logged and swallowed per
    /// spec.md §7 ("persistence failures never change the verdict served
    /// to the caller") — the event is still kept in the in-memory ring so
    /// queries during this process's lifetime remain accurate.
    pub async fn record(&self, event: EventRecord) {
        if let Err(err) = self.log.append(&event).await {
            warn!(error = %err, event_id = %event.id, "failed to persist event to the append-only log");
        }
        let mut recent = self.recent.write().await;
        recent.push_back(event);
        while recent.len() > self.max_events {
            recent.pop_front();
        }
    }

    pub async fn by_session(&self, session_key: &str) -> Vec<EventRecord> {
        self.recent.read().await.iter().filter(|e| e.session_key == session_key).cloned().collect()
    }

    pub async fn by_score_band(&self, band: VerdictKind) -> Vec<EventRecord> {
        self.recent.read().await.iter().filter(|e| e.verdict.verdict == band).cloned().collect()
    }

    pub async fn in_window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<EventRecord> {
        self.recent.read().await.iter().filter(|e| e.timestamp >= from && e.timestamp <= to).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.recent.read().await.len()
    }

    /// Rewrite the on-disk log to hold only the newest `max_events` rows.
    /// `JsonlStore` is append-only by design, so pruning bypasses it and
    /// writes the truncated log directly, using the same
    /// temp-file-then-rename pattern `guardrail_store::JsonStore` uses for
    /// atomic replacement.
    pub async fn prune(&self) -> StoreResult<()> {
        let recent = self.recent.read().await;
        let path = self.log.path();
        let Some(parent) = path.parent() else { return Ok(()) };
        fs::create_dir_all(parent).await?;
        let tmp_path = parent.join(".events.jsonl.tmp");

        let mut contents = String::new();
        for event in recent.iter() {
            contents.push_str(&serde_json::to_string(event)?);
            contents.push('\n');
        }

        let mut file = fs::OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, path).await?;
        debug!(kept = recent.len(), "pruned event log");
        Ok(())
    }
}

/// Query params for `GET /events`: `?session=...`, `?band=SAFE|WARNING|
/// BLOCK`, or `?from=...&to=...` (RFC 3339). At most one filter is
/// honored per request; an unfiltered request returns the full
/// in-memory window.
#[derive(Debug, Deserialize)]
pub struct EventQuery {
    pub session: Option<String>,
    pub band: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

fn parse_band(band: &str) -> AppResult<VerdictKind> {
    match band.to_uppercase().as_str() {
        "SAFE" => Ok(VerdictKind::Safe),
        "WARNING" => Ok(VerdictKind::Warning),
        "BLOCK" => Ok(VerdictKind::Block),
        other => Err(AppError::BadRequest(format!("unknown verdict band '{other}'"))),
    }
}

pub async fn list_events(State(state): State<Arc<AppState>>, Query(query): Query<EventQuery>) -> AppResult<Json<Vec<EventRecord>>> {
    if let Some(session) = query.session {
        return Ok(Json(state.events.by_session(&session).await));
    }
    if let Some(band) = query.band {
        return Ok(Json(state.events.by_score_band(parse_band(&band)?).await));
    }
    if let (Some(from), Some(to)) = (query.from, query.to) {
        return Ok(Json(state.events.in_window(from, to).await));
    }
    Ok(Json(state.events.in_window(DateTime::<Utc>::MIN_UTC, Utc::now()).await))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(list_events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardrail_model::{Action, EventSubType, Verdict};
    use tempfile::tempdir;

    fn event(session: &str, verdict: Verdict, ts: DateTime<Utc>) -> EventRecord {
        EventRecord::new("exec", EventSubType::PreToolUse, session, verdict, "ls", ts)
    }

    #[tokio::test]
    async fn records_are_queryable_by_session_and_band() {
        let dir = tempdir().unwrap();
        let paths = GuardrailPaths::from_root(dir.path().to_path_buf());
        paths.ensure_dirs_async().await.unwrap();
        let store = EventStore::load(&paths, 100).await.unwrap();

        let now = Utc::now();
        store.record(event("s1", Verdict::safe("ok", "none", "rules"), now)).await;
        store.record(event("s2", Verdict::block(9, "no", "danger", "rules"), now)).await;

        assert_eq!(store.by_session("s1").await.len(), 1);
        assert_eq!(store.by_score_band(VerdictKind::Block).await.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn load_caps_to_max_events_keeping_the_newest() {
        let dir = tempdir().unwrap();
        let paths = GuardrailPaths::from_root(dir.path().to_path_buf());
        paths.ensure_dirs_async().await.unwrap();
        {
            let store = EventStore::load(&paths, 100).await.unwrap();
            for i in 0..5 {
                store.record(event("s1", Verdict::safe(format!("ok-{i}"), "none", "rules"), Utc::now())).await;
            }
        }

        let reloaded = EventStore::load(&paths, 3).await.unwrap();
        assert_eq!(reloaded.len().await, 3);
        let rows = reloaded.by_session("s1").await;
        assert_eq!(rows[0].verdict.reason, "ok-2");
        assert_eq!(rows[2].verdict.reason, "ok-4");
    }

    #[tokio::test]
    async fn prune_rewrites_log_to_in_memory_window() {
        let dir = tempdir().unwrap();
        let paths = GuardrailPaths::from_root(dir.path().to_path_buf());
        paths.ensure_dirs_async().await.unwrap();
        let store = EventStore::load(&paths, 2).await.unwrap();
        for i in 0..4 {
            store.record(event("s1", Verdict::safe(format!("ok-{i}"), "none", "rules"), Utc::now())).await;
        }
        store.prune().await.unwrap();

        let reloaded = EventStore::load(&paths, 100).await.unwrap();
        assert_eq!(reloaded.len().await, 2);
    }
}
