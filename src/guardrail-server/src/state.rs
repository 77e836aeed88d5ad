//! Shared application state: composes every guardrail crate into the one
//! `Arc<AppState>` axum handlers are given, plus the background cleanup
//! task spec.md §4.2/§4.4/§4.8 call for (cache/session sweep every 5
//! minutes, event-log prune on a slower cadence).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use guardrail_core::{ApprovalCoordinator, SafeguardOrchestrator};
use guardrail_llm::{Judge, JudgeConfig, ModelSelector};
use guardrail_memory::PatternMemory;
use guardrail_store::GuardrailPaths;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::GuardrailConfig;
use crate::error::AppResult;
use crate::events::EventStore;
use crate::streaming::StreamIngestor;

/// How often the cache/session sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Event log pruning runs every this-many sweep ticks (roughly hourly at
/// the 5-minute sweep interval).
const PRUNE_EVERY_N_SWEEPS: u32 = 12;

pub struct AppState {
    pub config: GuardrailConfig,
    pub orchestrator: Arc<SafeguardOrchestrator>,
    pub approvals: Arc<ApprovalCoordinator>,
    pub events: Arc<EventStore>,
    pub streaming: StreamIngestor,
    started_at: Instant,
    /// Counter-based 1-in-N sampler backing `warning_sample_rate`
    /// (spec.md §4.8: "a small random sample can also be routed to ask
    /// for user feedback collection"). A modulus counter rather than true
    /// randomness, so sampling stays deterministic and testable.
    warning_sample_counter: AtomicU32,
}

impl AppState {
    pub async fn new(config: GuardrailConfig) -> AppResult<Self> {
        let paths = GuardrailPaths::new()?;
        paths.ensure_dirs_async().await?;
        Self::with_paths(config, paths).await
    }

    /// Build state rooted at explicit storage paths (tests, custom
    /// deployments via `GUARDRAIL_DATA_DIR`).
    pub async fn with_paths(config: GuardrailConfig, paths: GuardrailPaths) -> AppResult<Self> {
        let memory = Arc::new(PatternMemory::load(&paths).await?);
        let cache = guardrail_cache::DecisionCache::new();
        let history = Arc::new(guardrail_history::ToolHistoryTracker::with_capacity(config.max_tool_history));

        let model = if config.llm_model == "auto" { ModelSelector::Auto } else { ModelSelector::Fixed(config.llm_model.clone()) };
        let judge = Judge::new(JudgeConfig {
            backend_url: config.llm_backend_url.clone(),
            model,
            timeout: config.llm_timeout(),
            ..Default::default()
        });
        let orchestrator = Arc::new(SafeguardOrchestrator::new(cache, Arc::clone(&memory), Arc::clone(&history), judge, config.llm_model.clone()));
        let approvals = Arc::new(ApprovalCoordinator::new(memory));
        let events = Arc::new(EventStore::load(&paths, config.max_events).await?);
        let streaming = StreamIngestor::spawn(
            Arc::clone(&orchestrator),
            Arc::clone(&events),
            guardrail_core::ClassifyConfig { blocking_enabled: config.blocking_enabled },
            256,
        );

        Ok(Self { config, orchestrator, approvals, events, streaming, started_at: Instant::now(), warning_sample_counter: AtomicU32::new(0) })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// True on every Nth call, where N is `config.warning_sample_rate`;
    /// always false when sampling is disabled (`warning_sample_rate == 0`).
    pub fn sample_warning_for_feedback(&self) -> bool {
        let rate = self.config.warning_sample_rate;
        if rate == 0 {
            return false;
        }
        self.warning_sample_counter.fetch_add(1, Ordering::Relaxed) % rate == 0
    }

    /// Spawn the periodic cache/session sweep + event-log prune loop.
    /// Runs for the lifetime of the process; `tokio::select!`-driven
    /// graceful shutdown in `main.rs` simply lets this task leak until
    /// the process exits, same as the tool-history sweep it rides with.
    pub fn spawn_cleanup_task(self: &Arc<Self>) {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks: u32 = 0;
            loop {
                tokio::time::sleep(SWEEP_INTERVAL).await;
                let now = Utc::now();
                state.orchestrator.cache().sweep(now).await;
                state.orchestrator.history().sweep_idle_sessions(now).await;
                ticks += 1;
                if ticks % PRUNE_EVERY_N_SWEEPS == 0 {
                    if let Err(err) = state.events.prune().await {
                        tracing::warn!(error = %err, "event log prune failed");
                    } else {
                        debug!("event log pruned");
                    }
                }
            }
        });
        info!("cleanup task scheduled every {:?}", SWEEP_INTERVAL);
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.uptime().as_secs(),
            pending_approvals: self.approvals.pending_count().await,
            events_recorded: self.events.len().await,
            cache_hot_entries: self.orchestrator.cache().hot_len().await,
            cache_result_entries: self.orchestrator.cache().result_len().await,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub pending_approvals: usize,
    pub events_recorded: usize,
    pub cache_hot_entries: usize,
    pub cache_result_entries: usize,
}
