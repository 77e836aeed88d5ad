//! Safeguard orchestrator (C7) and approval coordinator (C9): the
//! glue that composes every other guardrail crate into one
//! `classify`/`resolve` surface for `guardrail-server` to drive.

mod approval;
mod orchestrator;

pub use approval::{ApprovalCoordinator, ApprovalError, PendingApprovalHandle};
pub use orchestrator::{ClassifyConfig, ClassifyInput, SafeguardOrchestrator};
