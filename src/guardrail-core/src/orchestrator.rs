//! Safeguard orchestrator (C7): the fixed 8-step pipeline that turns one
//! proposed [`Action`] into a [`Verdict`].
//!
//! No single teacher file owns this shape — it's new code composing
//! C1–C6 — but the "try cheap signals first, fall through to the
//! expensive one" structure mirrors an exec policy's own internal
//! fallthrough (danger check, then confirmation-needed check, then
//! allow) generalized across whole components instead of within one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use guardrail_cache::DecisionCache;
use guardrail_history::ToolHistoryTracker;
use guardrail_llm::Judge;
use guardrail_memory::{pattern as extract_pattern, PatternMemory};
use guardrail_model::{Action, ToolHistoryEntry, Verdict};
use guardrail_prompt::{build_prompt, MemoryContextEntry, TaskContext};
use tracing::debug;

/// Baseline raw score fed to the memory auto-approve shortcut — the
/// shortcut only ever need check whether memory's adjustment would pull
/// a nominal mid-band call below the BLOCK threshold, not re-derive a
/// score from scratch.
const AUTO_APPROVE_BASELINE_SCORE: u8 = 5;
/// Up to this many related patterns are surfaced as memory context in
/// the prompt; more than this just adds noise for the judge.
const RELATED_PATTERNS_IN_PROMPT: usize = 3;

pub(crate) fn command_str_for(action: &Action) -> String {
    match action.tool.as_str() {
        "exec" => action.param_str("command").unwrap_or_default().to_string(),
        "write" | "edit" | "read" => action
            .param_str("file_path")
            .or_else(|| action.param_str("path"))
            .unwrap_or_default()
            .to_string(),
        _ => {
            if !action.summary.is_empty() {
                action.summary.clone()
            } else {
                serde_json::to_string(&action.params).unwrap_or_default()
            }
        }
    }
}

/// Everything the orchestrator needs from the caller that isn't baked
/// into `Action` itself.
#[derive(Debug, Clone, Default)]
pub struct ClassifyInput<'a> {
    pub chain_history: &'a [ToolHistoryEntry],
    pub task_context: Option<&'a TaskContext>,
}

/// Configuration read as an immutable snapshot at the start of
/// processing one call, per spec.md §4.8's concurrency note.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyConfig {
    pub blocking_enabled: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self { blocking_enabled: true }
    }
}

/// Composes C1 (rules), C2 (cache), C3 (memory), C5 (prompt builder) and
/// C6 (LLM judge) into the fixed pipeline from spec.md §4.7.
pub struct SafeguardOrchestrator {
    cache: Arc<DecisionCache>,
    memory: Arc<PatternMemory>,
    history: Arc<ToolHistoryTracker>,
    judge: Judge,
    /// Model id used to pick a prompt style (spec.md §4.5); `"auto"` when
    /// the judge itself resolves the model lazily against the backend.
    model_hint: String,
}

impl SafeguardOrchestrator {
    pub fn new(
        cache: Arc<DecisionCache>,
        memory: Arc<PatternMemory>,
        history: Arc<ToolHistoryTracker>,
        judge: Judge,
        model_hint: impl Into<String>,
    ) -> Self {
        Self { cache, memory, history, judge, model_hint: model_hint.into() }
    }

    pub fn memory(&self) -> &Arc<PatternMemory> {
        &self.memory
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    pub fn history(&self) -> &Arc<ToolHistoryTracker> {
        &self.history
    }

    /// The full pipeline. Every step but the LLM call is infallible;
    /// an LLM failure never propagates — [`Judge::judge`] already folds
    /// transport/timeout/parse failures into a fallback verdict.
    pub async fn classify(&self, action: &Action, input: ClassifyInput<'_>, config: ClassifyConfig, now: DateTime<Utc>) -> Verdict {
        let chain_context_present = !input.chain_history.is_empty();

        // 1 + 2: rule fast-paths (high-risk exec table always wins; the
        // safe fast-path and write/edit specialization are both folded
        // into `guardrail_rules::classify` itself).
        if let Some(v) = guardrail_rules::classify(action, chain_context_present) {
            debug!(tool = %action.tool, verdict = %v.verdict, "rule fast-path decided");
            return v;
        }

        // 3: cache lookup.
        if let Some(v) = self.cache.lookup(action, chain_context_present, now).await {
            debug!(tool = %action.tool, "decision cache hit");
            return v;
        }

        let command_str = command_str_for(action);
        let pattern = extract_pattern(&action.tool, &command_str);

        // 4: memory auto-approve shortcut.
        if !chain_context_present && self.memory.auto_approve_eligible(&pattern, config.blocking_enabled, now).await {
            let v = Verdict::safe("pattern memory suggests auto-approve", "memory-auto-approve", "memory");
            debug!(pattern = %pattern, "memory auto-approve shortcut");
            return v;
        }

        // 5: LLM call, with assembled prompt.
        let memory_context = self.memory_context_for(&action.tool, &pattern).await;
        let prompt = build_prompt(action, input.chain_history, input.task_context, &memory_context, &self.model_hint);
        let raw_action_text = format!("{} {}", action.tool, command_str);
        let verdict = self.judge.judge(&prompt.system, &prompt.user, &raw_action_text).await;

        // 6: memory post-adjustment.
        let verdict = if chain_context_present {
            verdict
        } else {
            let delta = self.memory.score_adjustment(&pattern, verdict.score, now).await;
            verdict.apply_score_delta(delta)
        };

        // 7: cache insert.
        self.cache.insert(action, verdict.clone(), chain_context_present, now).await;

        verdict
    }

    async fn memory_context_for(&self, tool: &str, pattern: &str) -> Vec<MemoryContextEntry> {
        self.memory
            .related_lookup(tool, pattern, RELATED_PATTERNS_IN_PROMPT)
            .await
            .into_iter()
            .map(|p| MemoryContextEntry { pattern: p.pattern, approve_count: p.approve_count, deny_count: p.deny_count })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardrail_llm::{Judge, JudgeConfig};
    use guardrail_model::VerdictKind;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn orchestrator_with_backend(backend_url: String) -> SafeguardOrchestrator {
        let dir = tempdir().unwrap();
        let paths = guardrail_store::GuardrailPaths::from_root(dir.path().to_path_buf());
        paths.ensure_dirs_async().await.unwrap();
        let memory = Arc::new(PatternMemory::load(&paths).await.unwrap());
        let cache = DecisionCache::new();
        let history = Arc::new(ToolHistoryTracker::new());
        let judge = Judge::new(JudgeConfig { backend_url, ..Default::default() });
        SafeguardOrchestrator::new(cache, memory, history, judge, "qwen2.5-3b-instruct")
    }

    #[tokio::test]
    async fn rule_fast_path_blocks_without_touching_llm() {
        let orch = orchestrator_with_backend("http://127.0.0.1:1".to_string()).await;
        let action = Action::new("exec", "s1").with_param("command", "sudo rm -rf /");
        let v = orch.classify(&action, ClassifyInput::default(), ClassifyConfig::default(), Utc::now()).await;
        assert_eq!(v.verdict, VerdictKind::Block);
        assert_eq!(v.backend, "rules");
    }

    #[tokio::test]
    async fn unrecognized_exec_falls_through_to_llm_and_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "qwen2.5-3b-instruct"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"verdict\":\"WARNING\",\"reason\":\"unclear\"}"}}]
            })))
            .mount(&server)
            .await;

        let orch = orchestrator_with_backend(format!("{}/v1", server.uri())).await;
        let action = Action::new("exec", "s1").with_param("command", "./deploy.sh staging");
        let now = Utc::now();
        let v1 = orch.classify(&action, ClassifyInput::default(), ClassifyConfig::default(), now).await;
        assert_eq!(v1.verdict, VerdictKind::Warning);
        assert!(!v1.cached);

        let v2 = orch.classify(&action, ClassifyInput::default(), ClassifyConfig::default(), now).await;
        assert!(v2.cached);
    }

    #[tokio::test]
    async fn chain_context_present_bypasses_cache_and_safe_fast_path() {
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

        let orch = orchestrator_with_backend(format!("{}/v1", server.uri())).await;
        // `cat` alone is on the safe whitelist, but with chain history
        // present it must still go to the LLM rather than fast-pathing.
        let action = Action::new("exec", "s1").with_param("command", "cat ~/.ssh/id_rsa");
        let history_entry = ToolHistoryEntry::new(
            "read",
            std::collections::BTreeMap::new(),
            &serde_json::json!("prior output"),
            Utc::now(),
        );
        let input = ClassifyInput { chain_history: &[history_entry], task_context: None };
        let v = orch.classify(&action, input, ClassifyConfig::default(), Utc::now()).await;
        assert_eq!(v.backend, "llm:m");
    }
}
