//! Approval coordinator (C9): suspends the synchronous hook response on
//! `ask` until a human resolves it via the approval side-channel.
//!
//! Grounded in the shape of an `oneshot::channel`-per-pending-request
//! approval manager: one `Arc<RwLock<HashMap<Uuid, Pending>>>` of request
//! state plus a `oneshot::Sender` stashed alongside each entry so
//! `resolve` can wake the task that's blocked in `wait_for_resolution`.
//! `tokio::time::timeout` bounds the wait so a forgotten approval doesn't
//! hang the agent host forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use guardrail_memory::PatternMemory;
use guardrail_model::{Action, ApprovalResolution, ApprovalStatus, DecisionKind, PendingApproval, Verdict};
use thiserror::Error;
use tokio::sync::{oneshot, RwLock};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("no pending approval with id {0}")]
    NotFound(Uuid),
    #[error("approval {0} was already resolved")]
    AlreadyResolved(Uuid),
}

struct Slot {
    approval: PendingApproval,
    resolver: Option<oneshot::Sender<ApprovalResolution>>,
}

/// Tracks in-flight approvals created by the synchronous hook path and
/// resolved by a human via the side-channel HTTP API.
pub struct ApprovalCoordinator {
    pending: RwLock<HashMap<Uuid, Slot>>,
    memory: Arc<PatternMemory>,
}

impl ApprovalCoordinator {
    pub fn new(memory: Arc<PatternMemory>) -> Self {
        Self { pending: RwLock::new(HashMap::new()), memory }
    }

    /// Create a pending approval for `action`/`verdict` and return both
    /// its id (for the caller to surface to `GET /approvals/pending`) and
    /// a future that resolves once a human calls `resolve`, or times out.
    pub async fn create(&self, action: Action, verdict: Verdict, now: DateTime<Utc>) -> (Uuid, PendingApprovalHandle) {
        let approval = PendingApproval::new(action, verdict, now);
        let id = approval.id;
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(id, Slot { approval, resolver: Some(tx) });
        (id, PendingApprovalHandle { id, rx })
    }

    /// List every approval still in `Created` state.
    pub async fn list_pending(&self) -> Vec<PendingApproval> {
        self.pending
            .read()
            .await
            .values()
            .filter(|slot| slot.approval.status == ApprovalStatus::Created)
            .map(|slot| slot.approval.clone())
            .collect()
    }

    /// Resolve a pending approval. Idempotent resolution is rejected:
    /// a second `resolve` call for the same id is an error, not a no-op,
    /// per spec.md §4.9 ("double-resolves are errors").
    ///
    /// `always-approve` additionally records a strong positive signal in
    /// pattern memory and forces the pattern's `suggestedAction` to
    /// `auto-approve` regardless of confidence math.
    pub async fn resolve(&self, id: Uuid, resolution: ApprovalResolution, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        let mut pending = self.pending.write().await;
        let slot = pending.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
        if slot.approval.is_resolved() {
            return Err(ApprovalError::AlreadyResolved(id));
        }

        slot.approval.status = match resolution {
            ApprovalResolution::Approve | ApprovalResolution::AlwaysApprove => ApprovalStatus::Approved,
            ApprovalResolution::Deny => ApprovalStatus::Denied,
        };

        let action = slot.approval.action.clone();
        let score = slot.approval.verdict.score;
        if let Some(tx) = slot.resolver.take() {
            let _ = tx.send(resolution);
        }
        drop(pending);

        let command_str = crate::orchestrator::command_str_for(&action);
        let decision = match resolution {
            ApprovalResolution::Approve | ApprovalResolution::AlwaysApprove => DecisionKind::Approve,
            ApprovalResolution::Deny => DecisionKind::Deny,
        };
        if let Err(err) = self.memory.record_decision(&action.tool, &command_str, score, decision, &action.session_key, now).await {
            warn!(error = %err, "failed to record approval decision in pattern memory");
        }
        if matches!(resolution, ApprovalResolution::AlwaysApprove) {
            if let Err(err) = self.memory.force_auto_approve(&action.tool, &command_str, now).await {
                warn!(error = %err, "failed to force auto-approve in pattern memory");
            }
        }

        Ok(())
    }

    /// Mark every still-`Created` approval as orphaned, e.g. on process
    /// shutdown. The caller's own timeout treats an unresolved approval
    /// as a deny; this just makes that state observable afterwards.
    pub async fn orphan_all_pending(&self) {
        let mut pending = self.pending.write().await;
        for slot in pending.values_mut() {
            if slot.approval.status == ApprovalStatus::Created {
                slot.approval.status = ApprovalStatus::OrphanedByRestart;
            }
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.values().filter(|s| s.approval.status == ApprovalStatus::Created).count()
    }
}

/// A handle the synchronous hook path awaits on; resolves with the human's
/// resolution, or `None` on timeout (treated as a deny by the caller).
pub struct PendingApprovalHandle {
    id: Uuid,
    rx: oneshot::Receiver<ApprovalResolution>,
}

impl PendingApprovalHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Await resolution, bounded by `timeout`. On elapsed timeout the
    /// approval's status is flipped to `TimedOut` by the caller (the
    /// coordinator doesn't do this itself since it has no reference back
    /// without re-taking the write lock; callers should invoke
    /// [`ApprovalCoordinator::mark_timed_out`] after a `None`).
    pub async fn wait(self, timeout: Duration) -> Option<ApprovalResolution> {
        tokio::time::timeout(timeout, self.rx).await.ok()?.ok()
    }
}

impl ApprovalCoordinator {
    pub async fn mark_timed_out(&self, id: Uuid) {
        let mut pending = self.pending.write().await;
        if let Some(slot) = pending.get_mut(&id) {
            if slot.approval.status == ApprovalStatus::Created {
                slot.approval.status = ApprovalStatus::TimedOut;
            }
        }
    }
}
