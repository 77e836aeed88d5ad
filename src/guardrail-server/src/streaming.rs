//! In-process streaming gateway ingestor.
//!
//! An in-process `mpsc` ingestor stands in for an external streaming
//! gateway: callers push [`StreamEvent`]s (start/update/result phases
//! keyed by `tool_call_id`) onto a channel and a background task
//! reassembles and classifies each call exactly once, on its `start`
//! phase.
//!
//! Grounded in the same `tokio::sync::mpsc` + background-task shape the
//! workspace uses elsewhere for decoupling an ingestion surface from its
//! processing loop.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use guardrail_core::{ClassifyConfig, ClassifyInput, SafeguardOrchestrator};
use guardrail_model::{Action, EventRecord, EventSubType};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::EventStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Start,
    Update,
    Result,
}

#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub session_key: String,
    pub tool_call_id: String,
    pub tool: String,
    pub phase: StreamPhase,
    pub params: BTreeMap<String, Value>,
}

/// Handle callers use to push events; the reassembly loop runs on a
/// detached background task.
#[derive(Clone)]
pub struct StreamIngestor {
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamIngestor {
    /// Spawn the background reassembly loop and return a handle to feed
    /// it. `channel_capacity` bounds backpressure from a gateway that
    /// produces events faster than classification can keep up.
    pub fn spawn(orchestrator: Arc<SafeguardOrchestrator>, events: Arc<EventStore>, config: ClassifyConfig, channel_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(channel_capacity);
        tokio::spawn(Self::run(rx, orchestrator, events, config));
        Self { tx }
    }

    /// Push one phase of a streamed tool call. Never blocks the hook
    /// path — a full channel just drops the event with a warning, since
    /// streaming classification is advisory (the hook path is what
    /// actually gates the tool call).
    pub fn ingest(&self, event: StreamEvent) {
        if self.tx.try_send(event).is_err() {
            warn!("streaming ingestor channel full, dropping event");
        }
    }

    async fn run(mut rx: mpsc::Receiver<StreamEvent>, orchestrator: Arc<SafeguardOrchestrator>, events: Arc<EventStore>, config: ClassifyConfig) {
        let mut analyzed: HashSet<String> = HashSet::new();
        while let Some(event) = rx.recv().await {
            if event.phase != StreamPhase::Start {
                continue;
            }
            if !analyzed.insert(event.tool_call_id.clone()) {
                continue;
            }

            let action = Action::new(event.tool.clone(), event.session_key.clone()).with_params(event.params);
            let now = Utc::now();
            let chain_history = orchestrator.history().chain_context(&action.session_key, &action.tool, now).await;
            let input = ClassifyInput { chain_history: &chain_history, task_context: None };
            let verdict = orchestrator.classify(&action, input, config, now).await;

            debug!(tool = %action.tool, tool_call_id = %event.tool_call_id, verdict = %verdict.verdict, "streaming classification complete");

            // Streaming-sourced events never overwrite a hook's verdict
            // for the same call; they are always tagged non-authoritative.
            let record = EventRecord::new(action.tool.clone(), EventSubType::Streaming, action.session_key.clone(), verdict, action.summary.clone(), now)
                .non_authoritative();
            events.record(record).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardrail_llm::{Judge, JudgeConfig};
    use guardrail_memory::PatternMemory;
    use guardrail_store::GuardrailPaths;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_setup() -> (Arc<SafeguardOrchestrator>, Arc<EventStore>, MockServer) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": [{"id": "m"}]})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"verdict\":\"SAFE\",\"reason\":\"ok\"}"}}]
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let paths = GuardrailPaths::from_root(dir.path().to_path_buf());
        paths.ensure_dirs_async().await.unwrap();
        let memory = Arc::new(PatternMemory::load(&paths).await.unwrap());
        let cache = guardrail_cache::DecisionCache::new();
        let history = Arc::new(guardrail_history::ToolHistoryTracker::new());
        let judge = Judge::new(JudgeConfig { backend_url: format!("{}/v1", server.uri()), ..Default::default() });
        let orchestrator = Arc::new(SafeguardOrchestrator::new(cache, memory, history, judge, "m"));
        let events = Arc::new(EventStore::load(&paths, 100).await.unwrap());
        (orchestrator, events, server)
    }

    #[tokio::test]
    async fn start_phase_produces_one_non_authoritative_event() {
        let (orchestrator, events, _server) = test_setup().await;
        let ingestor = StreamIngestor::spawn(orchestrator, Arc::clone(&events), ClassifyConfig::default(), 16);

        ingestor.ingest(StreamEvent {
            session_key: "s1".into(),
            tool_call_id: "call-1".into(),
            tool: "read".into(),
            phase: StreamPhase::Start,
            params: BTreeMap::new(),
        });
        ingestor.ingest(StreamEvent {
            session_key: "s1".into(),
            tool_call_id: "call-1".into(),
            tool: "read".into(),
            phase: StreamPhase::Result,
            params: BTreeMap::new(),
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        let rows = events.by_session("s1").await;
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].authoritative);
    }

    #[tokio::test]
    async fn duplicate_start_for_same_tool_call_id_is_ignored() {
        let (orchestrator, events, _server) = test_setup().await;
        let ingestor = StreamIngestor::spawn(orchestrator, Arc::clone(&events), ClassifyConfig::default(), 16);

        for _ in 0..3 {
            ingestor.ingest(StreamEvent {
                session_key: "s1".into(),
                tool_call_id: "call-dup".into(),
                tool: "read".into(),
                phase: StreamPhase::Start,
                params: BTreeMap::new(),
            });
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(events.by_session("s1").await.len(), 1);
    }
}
