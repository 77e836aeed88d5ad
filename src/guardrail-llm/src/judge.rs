//! The LLM judge client (C6): model selection, the request contract, a
//! forgiving parser for small local models' output, a hallucination
//! guard, and a deterministic regex fallback for when the backend is
//! unreachable or its answer cannot be parsed at all.

use std::sync::LazyLock;
use std::time::Duration;

use guardrail_model::{Verdict, VerdictKind};
use regex::Regex;
use tracing::warn;

use crate::client::LlmClient;
use crate::models::{ChatMessage, ChatRequest};
use crate::Result;

/// Which model id to use for judging.
#[derive(Debug, Clone)]
pub enum ModelSelector {
    /// Query `/models`, drop anything that looks like an embedding model,
    /// and use the first one left.
    Auto,
    Fixed(String),
}

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub backend_url: String,
    pub model: ModelSelector,
    /// Global request timeout; on expiry the judge falls back to the
    /// regex classifier rather than hanging the caller.
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            backend_url: crate::DEFAULT_BACKEND_URL.to_string(),
            model: ModelSelector::Auto,
            timeout: Duration::from_secs(30),
            temperature: 0.05,
            max_tokens: 200,
        }
    }
}

pub struct Judge {
    client: LlmClient,
    config: JudgeConfig,
}

impl Judge {
    pub fn new(config: JudgeConfig) -> Self {
        let client = LlmClient::new(config.backend_url.clone(), config.timeout);
        Self { client, config }
    }

    /// Resolve the model id to use for this request. `Auto` is re-resolved
    /// on every call rather than cached once, since a local model manager
    /// may load/unload models between requests.
    async fn resolve_model(&self) -> Result<String> {
        match &self.config.model {
            ModelSelector::Fixed(id) => Ok(id.clone()),
            ModelSelector::Auto => {
                let models = self.client.fetch_models().await?;
                models
                    .into_iter()
                    .find(|m| !m.looks_like_embedding_model())
                    .map(|m| m.id)
                    .ok_or_else(|| crate::LlmError::NoUsableModel)
            }
        }
    }

    /// Run one judge call: `system_prompt`/`user_prompt` are the fully
    /// assembled prompt (built by `guardrail-prompt`); `raw_action_text` is
    /// the literal command/params string, used only by the hallucination
    /// guard to check whether the model's reasoning actually refers to
    /// what was asked about.
    ///
    /// Never fails: on transport error, timeout, or unparseable output
    /// this returns the deterministic fallback verdict instead of
    /// propagating an error, so the classifier's hot path never blocks on
    /// the LLM being unavailable.
    pub async fn judge(&self, system_prompt: &str, user_prompt: &str, raw_action_text: &str) -> Verdict {
        let model = match tokio::time::timeout(self.config.timeout, self.resolve_model()).await {
            Ok(Ok(model)) => model,
            Ok(Err(err)) => {
                warn!(error = %err, "failed to resolve judge model, using fallback classifier");
                return fallback_classify(raw_action_text);
            }
            Err(_) => {
                warn!("timed out resolving judge model, using fallback classifier");
                return fallback_classify(raw_action_text);
            }
        };

        let request = ChatRequest::new(
            model.clone(),
            vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = match tokio::time::timeout(self.config.timeout, self.client.chat_completion(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(error = %err, "llm transport error, using fallback classifier");
                return fallback_classify(raw_action_text);
            }
            Err(_) => {
                warn!(timeout_ms = self.config.timeout.as_millis(), "llm request timed out, using fallback classifier");
                return fallback_classify(raw_action_text);
            }
        };

        let Some(content) = response.content() else {
            warn!("llm response had no content, using fallback classifier");
            return fallback_classify(raw_action_text);
        };

        match parse_verdict(content) {
            Some(parsed) => {
                let backend = format!("llm:{model}");
                let verdict = apply_hallucination_guard(parsed.into_verdict(&backend), content, raw_action_text);
                verdict
            }
            None => {
                warn!(raw = %content.chars().take(500).collect::<String>(), "failed to parse llm response, using fallback classifier");
                fallback_classify(raw_action_text)
            }
        }
    }
}

/// The verdict shape after normalization, before it's stamped with a
/// `backend` tag (which depends on which model answered).
struct ParsedVerdict {
    kind: VerdictKind,
    score: u8,
    reason: String,
    category: String,
    warnings: Vec<String>,
}

impl ParsedVerdict {
    fn into_verdict(self, backend: &str) -> Verdict {
        Verdict::new(self.kind, self.score, self.reason, self.category, backend).with_warnings(self.warnings)
    }
}

fn verdict_kind_to_score(kind: VerdictKind) -> u8 {
    match kind {
        VerdictKind::Safe => 2,
        VerdictKind::Warning => 5,
        VerdictKind::Block => 9,
    }
}

static THINK_BLOCK_CLOSED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static THINK_BLOCK_UNCLOSED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<think>.*\z").unwrap());
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```(?:json)?").unwrap());

/// Strip `<think>…</think>` (closed or not), strip code-fence markers,
/// slice to the substring between the first `{` and the last `}`, parse
/// as JSON, and if that fails attempt one repair pass that removes
/// trailing commas. Returns `None` for a genuinely unparseable response —
/// including an unclosed `<think>` block with no JSON preceding it.
fn parse_verdict(raw: &str) -> Option<ParsedVerdict> {
    let had_unclosed_think = THINK_BLOCK_UNCLOSED.is_match(raw) && !THINK_BLOCK_CLOSED.is_match(raw);
    let stripped = THINK_BLOCK_CLOSED.replace_all(raw, "");
    let stripped = if had_unclosed_think {
        THINK_BLOCK_UNCLOSED.replace_all(&stripped, "")
    } else {
        stripped
    };
    let stripped = CODE_FENCE.replace_all(&stripped, "");

    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end < start {
        return None;
    }
    let candidate = &stripped[start..=end];

    let value: serde_json::Value = match serde_json::from_str(candidate) {
        Ok(v) => v,
        Err(_) => {
            let repaired = remove_trailing_commas(candidate);
            serde_json::from_str(&repaired).ok()?
        }
    };

    normalize(&value)
}

fn remove_trailing_commas(s: &str) -> String {
    static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());
    TRAILING_COMMA.replace_all(s, "$1").into_owned()
}

/// Accept either `{verdict, reason}` or the legacy
/// `{riskScore, category, reasoning, allowed, warnings}` shape.
fn normalize(value: &serde_json::Value) -> Option<ParsedVerdict> {
    if let Some(verdict_str) = value.get("verdict").and_then(|v| v.as_str()) {
        let kind = match verdict_str.to_uppercase().as_str() {
            "SAFE" => VerdictKind::Safe,
            "WARNING" => VerdictKind::Warning,
            "BLOCK" => VerdictKind::Block,
            _ => return None,
        };
        let reason = value.get("reason").and_then(|v| v.as_str()).unwrap_or("no reason given").to_string();
        return Some(ParsedVerdict {
            score: verdict_kind_to_score(kind),
            kind,
            reason,
            category: value.get("category").and_then(|v| v.as_str()).unwrap_or("unspecified").to_string(),
            warnings: Vec::new(),
        });
    }

    let risk_score = value.get("riskScore").and_then(|v| v.as_f64())?;
    let score = risk_score.clamp(0.0, 10.0).round() as u8;
    let allowed = value.get("allowed").and_then(|v| v.as_bool());
    let kind = if allowed == Some(false) {
        VerdictKind::Block
    } else {
        VerdictKind::from_score(score)
    };
    let reason = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .unwrap_or("no reasoning given")
        .to_string();
    let warnings = value
        .get("warnings")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|w| w.as_str().map(String::from)).collect())
        .unwrap_or_default();

    Some(ParsedVerdict {
        score: score.clamp(kind.band().0, kind.band().1),
        kind,
        reason,
        category: value.get("category").and_then(|v| v.as_str()).unwrap_or("unspecified").to_string(),
        warnings,
    })
}

/// Tokens a model's BLOCK reasoning might mention that would, if actually
/// present in the command, justify the block. If none of them appear in
/// `raw_action_text`, the model is describing a different command than
/// the one it was asked about and has no useful signal.
const HALLUCINATION_TOKENS: &[&str] = &["rm -rf /", "fork bomb", "dd if=", "| bash"];

fn apply_hallucination_guard(verdict: Verdict, model_reasoning: &str, raw_action_text: &str) -> Verdict {
    if verdict.verdict != VerdictKind::Block {
        return verdict;
    }
    let mentioned_in_reasoning: Vec<&str> = HALLUCINATION_TOKENS
        .iter()
        .copied()
        .filter(|tok| model_reasoning.contains(tok))
        .collect();
    if mentioned_in_reasoning.is_empty() {
        return verdict;
    }
    let actually_present = mentioned_in_reasoning.iter().any(|tok| raw_action_text.contains(tok));
    if actually_present {
        return verdict;
    }

    let mut downgraded = Verdict::warning(
        6,
        format!(
            "judge reasoning mentioned {:?} which does not appear in the actual command; downgraded from BLOCK",
            mentioned_in_reasoning
        ),
        verdict.category,
        verdict.backend,
    );
    let mut warnings = verdict.warnings;
    warnings.push("hallucination".to_string());
    downgraded.warnings = warnings;
    downgraded
}

static FALLBACK_DANGEROUS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"rm\s+-rf\s+/").unwrap(),
        Regex::new(r":\(\)\s*\{.*:\|:.*\}").unwrap(),
        Regex::new(r"\bdd\s+if=").unwrap(),
        Regex::new(r"\bmkfs\.").unwrap(),
        Regex::new(r">\s*/dev/sd[a-z]").unwrap(),
    ]
});

/// Deterministic regex classifier used whenever the LLM is unreachable or
/// its response cannot be parsed. Conservative: score 6 (WARNING) by
/// default, 8-10 for well-known danger regexes.
pub fn fallback_classify(raw_action_text: &str) -> Verdict {
    for re in FALLBACK_DANGEROUS.iter() {
        if re.is_match(raw_action_text) {
            return Verdict::block(9, "fallback classifier matched a well-known destructive pattern", "fallback-danger", "fallback");
        }
    }
    Verdict::warning(6, "llm judge unavailable; conservative fallback verdict", "fallback-unknown", "fallback")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_shape() {
        let parsed = parse_verdict(r#"{"verdict": "SAFE", "reason": "read only"}"#).unwrap();
        assert_eq!(parsed.kind, VerdictKind::Safe);
        assert_eq!(parsed.score, 2);
    }

    #[test]
    fn parses_legacy_shape() {
        let parsed = parse_verdict(r#"{"riskScore": 9, "category": "exfil", "reasoning": "bad", "allowed": false, "warnings": ["x"]}"#).unwrap();
        assert_eq!(parsed.kind, VerdictKind::Block);
        assert_eq!(parsed.score, 9);
        assert_eq!(parsed.warnings, vec!["x".to_string()]);
    }

    #[test]
    fn strips_closed_think_block_and_code_fences() {
        let raw = "<think>let me consider...</think>```json\n{\"verdict\":\"WARNING\",\"reason\":\"maybe\"}\n```";
        let parsed = parse_verdict(raw).unwrap();
        assert_eq!(parsed.kind, VerdictKind::Warning);
    }

    #[test]
    fn unclosed_think_with_no_json_fails_to_parse() {
        assert!(parse_verdict("<think>still thinking about this one").is_none());
    }

    #[test]
    fn repairs_trailing_comma() {
        let parsed = parse_verdict(r#"{"verdict": "SAFE", "reason": "ok",}"#).unwrap();
        assert_eq!(parsed.kind, VerdictKind::Safe);
    }

    #[test]
    fn hallucinated_block_downgrades_to_warning() {
        let verdict = Verdict::block(9, "x", "y", "llm:tiny-model");
        let downgraded = apply_hallucination_guard(
            verdict,
            "this would run rm -rf / and destroy everything",
            "git status",
        );
        assert_eq!(downgraded.verdict, VerdictKind::Warning);
        assert!(downgraded.warnings.contains(&"hallucination".to_string()));
    }

    #[test]
    fn block_with_accurate_reasoning_is_not_downgraded() {
        let verdict = Verdict::block(9, "x", "y", "llm:tiny-model");
        let kept = apply_hallucination_guard(verdict, "this runs rm -rf / on the host", "rm -rf /");
        assert_eq!(kept.verdict, VerdictKind::Block);
    }

    #[test]
    fn fallback_matches_known_danger_regex() {
        let v = fallback_classify("rm -rf /");
        assert_eq!(v.verdict, VerdictKind::Block);
        assert_eq!(v.backend, "fallback");
    }

    #[test]
    fn fallback_defaults_to_warning_for_unknown_commands() {
        let v = fallback_classify("some_custom_tool --flag");
        assert_eq!(v.verdict, VerdictKind::Warning);
        assert_eq!(v.score, 6);
    }
}
