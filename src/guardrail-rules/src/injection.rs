//! Prompt-injection content scanning for the `user-prompt` hook
//! (spec.md §6: "runs prompt-injection regexes (instruction-override
//! phrases, XML tag injection, DAN patterns) and emits a security event
//! on match"). This is a detection backstop, not a blocking rule — a
//! match is logged as a security event; the prompt itself is never
//! rejected, since the agent host (not guardrail) owns the conversation.

use std::sync::LazyLock;

use regex::Regex;

static INJECTION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)ignore (all |any )?(previous|prior|above) instructions").unwrap(),
            "instruction-override phrase",
        ),
        (
            Regex::new(r"(?i)disregard (all |any )?(previous|prior|above|your) (instructions|rules|guidelines)").unwrap(),
            "instruction-override phrase",
        ),
        (Regex::new(r"(?i)you are (now |)(DAN|in developer mode|unrestricted)").unwrap(), "jailbreak persona (DAN) pattern"),
        (Regex::new(r"(?i)do anything now").unwrap(), "jailbreak persona (DAN) pattern"),
        (Regex::new(r"</?(system|assistant|tool_result|chain_history)>").unwrap(), "XML tag injection targeting a trusted block"),
        (Regex::new(r"(?i)new system prompt").unwrap(), "instruction-override phrase"),
        (Regex::new(r"(?i)reveal (your |the )?(system prompt|instructions)").unwrap(), "system prompt exfiltration attempt"),
    ]
});

/// First matching category, if any. Callers only need to know whether to
/// emit a security event, not every match.
pub fn scan_for_prompt_injection(text: &str) -> Option<&'static str> {
    INJECTION_PATTERNS.iter().find(|(re, _)| re.is_match(text)).map(|(_, reason)| *reason)
}
