//! Human approval side-channel (C9 HTTP surface): list pending approvals
//! and resolve them. The synchronous hook handler that created the
//! pending approval is the one actually waiting on it; these endpoints
//! just wake it up via [`guardrail_core::ApprovalCoordinator::resolve`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use guardrail_model::{ApprovalResolution, PendingApproval};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub async fn list_pending(State(state): State<Arc<AppState>>) -> Json<Vec<PendingApproval>> {
    Json(state.approvals.list_pending().await)
}

#[derive(Debug, Deserialize)]
pub struct ApproveQuery {
    /// `?always=true` forces the pattern's `suggestedAction` to
    /// `auto-approve` in pattern memory regardless of confidence math.
    #[serde(default)]
    pub always: bool,
}

pub async fn approve(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>, Query(query): Query<ApproveQuery>) -> AppResult<Json<serde_json::Value>> {
    let resolution = if query.always { ApprovalResolution::AlwaysApprove } else { ApprovalResolution::Approve };
    state.approvals.resolve(id, resolution, Utc::now()).await.map_err(AppError::from)?;
    Ok(Json(serde_json::json!({})))
}

pub async fn deny(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> AppResult<Json<serde_json::Value>> {
    state.approvals.resolve(id, ApprovalResolution::Deny, Utc::now()).await.map_err(AppError::from)?;
    Ok(Json(serde_json::json!({})))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/approvals/pending", get(list_pending))
        .route("/approvals/{id}/approve", post(approve))
        .route("/approvals/{id}/deny", post(deny))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardrailConfig;
    use guardrail_model::{Action, Verdict};
    use guardrail_store::GuardrailPaths;
    use tempfile::tempdir;

    async fn test_state() -> Arc<AppState> {
        let dir = tempdir().unwrap();
        let paths = GuardrailPaths::from_root(dir.path().to_path_buf());
        let mut config = GuardrailConfig::default();
        config.llm_backend_url = "http://127.0.0.1:1".to_string();
        Arc::new(AppState::with_paths(config, paths).await.unwrap())
    }

    #[tokio::test]
    async fn approve_then_deny_unknown_errors() {
        let state = test_state().await;
        let action = Action::new("exec", "s1").with_param("command", "git push origin main");
        let (id, _handle) = state.approvals.create(action, Verdict::warning(6, "x", "y", "llm:m"), Utc::now()).await;

        assert_eq!(list_pending(State(Arc::clone(&state))).await.0.len(), 1);

        approve(State(Arc::clone(&state)), Path(id), Query(ApproveQuery { always: false })).await.unwrap();
        assert_eq!(list_pending(State(Arc::clone(&state))).await.0.len(), 0);

        let err = deny(State(state), Path(id)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_id_is_404() {
        let state = test_state().await;
        let err = approve(State(state), Path(Uuid::new_v4()), Query(ApproveQuery { always: false })).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
