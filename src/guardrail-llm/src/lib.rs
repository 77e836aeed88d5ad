//! LLM judge client (C6) for guardrail's tool-call classifier.
//!
//! Talks to a local OpenAI-compatible completion endpoint, parses its
//! 3-tier verdict, guards against hallucinated reasoning on small models,
//! and falls back to a deterministic regex classifier on any transport,
//! timeout, or parse failure. Prompt assembly lives in `guardrail-prompt`;
//! this crate only runs the request/response leg and never fails outward
//! — [`Judge::judge`] always returns a [`guardrail_model::Verdict`].

mod client;
mod judge;
mod models;

pub use client::LlmClient;
pub use judge::{fallback_classify, Judge, JudgeConfig, ModelSelector};
pub use models::{ChatMessage, ChatRequest, ChatResponse, Model};

/// Default local backend URL (LM Studio's default port, shared by most
/// OpenAI-compatible local servers via a reverse-proxy config).
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:1234/v1";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("no usable (non-embedding) model available from backend")]
    NoUsableModel,
}

pub type Result<T> = std::result::Result<T, LlmError>;
