use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result snippets are suffix-truncated to this many characters.
pub const RESULT_SNIPPET_MAX_CHARS: usize = 400;
const ELLIPSIS: &str = "...";

/// One entry in a per-session tool-call ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolHistoryEntry {
    pub tool: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    pub result_snippet: String,
    pub timestamp: DateTime<Utc>,
}

impl ToolHistoryEntry {
    pub fn new(
        tool: impl Into<String>,
        params: BTreeMap<String, Value>,
        result: &Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tool: tool.into(),
            params,
            result_snippet: extract_snippet(result),
            timestamp,
        }
    }
}

/// Flatten an MCP-style `content: [{type: "text", text: "..."}]` array if
/// present, otherwise stringify the value, then truncate to
/// [`RESULT_SNIPPET_MAX_CHARS`] with a trailing ellipsis marker.
pub fn extract_snippet(result: &Value) -> String {
    let raw = if let Some(content) = result.get("content").and_then(Value::as_array) {
        content
            .iter()
            .filter_map(|block| {
                if block.get("type").and_then(Value::as_str) == Some("text") {
                    block.get("text").and_then(Value::as_str)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else if let Some(s) = result.as_str() {
        s.to_string()
    } else {
        result.to_string()
    };

    truncate_with_ellipsis(&raw, RESULT_SNIPPET_MAX_CHARS)
}

fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}{ELLIPSIS}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_mcp_content_blocks() {
        let result = json!({"content": [{"type": "text", "text": "hello"}, {"type": "text", "text": "world"}]});
        assert_eq!(extract_snippet(&result), "hello\nworld");
    }

    #[test]
    fn stringifies_plain_values() {
        assert_eq!(extract_snippet(&json!("ok")), "ok");
        assert_eq!(extract_snippet(&json!(42)), "42");
    }

    #[test]
    fn truncates_with_ellipsis() {
        let long = "x".repeat(500);
        let snippet = extract_snippet(&json!(long));
        assert_eq!(snippet.len(), RESULT_SNIPPET_MAX_CHARS + 3);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn short_values_are_untouched() {
        assert_eq!(extract_snippet(&json!("short")), "short");
    }
}
