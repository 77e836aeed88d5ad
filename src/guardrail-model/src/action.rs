use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable description of one proposed tool call.
///
/// Constructed once per event and never mutated; every component that
/// touches an `Action` reads it, it never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    /// Short tag: `exec`, `read`, `write`, `edit`, `web_fetch`,
    /// `web_search`, `message`, `browser`, `canvas`, `sessions_spawn`,
    /// `process`, etc.
    pub tool: String,
    /// Mapping of string to value; shape is per-tool.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Opaque string identifying the originating conversation.
    pub session_key: String,
    /// Human-readable one-line description.
    #[serde(default)]
    pub summary: String,
}

impl Action {
    pub fn new(tool: impl Into<String>, session_key: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: BTreeMap::new(),
            session_key: session_key.into(),
            summary: String::new(),
        }
    }

    pub fn with_params(mut self, params: BTreeMap<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Fetch a string-typed param, e.g. `command`, `file_path`, `content`.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Whether this tool can carry data out of the machine and so needs
    /// chain-context analysis.
    pub fn is_exit_type(&self) -> bool {
        crate::is_exit_type_tool(&self.tool)
    }

    /// Stable fingerprint used to key the decision cache: `tool` followed
    /// by params serialized with sorted keys (a `BTreeMap` is already
    /// sorted, so `serde_json` on it is stable by construction).
    pub fn fingerprint(&self) -> String {
        let params_json = serde_json::to_string(&self.params).unwrap_or_default();
        format!("{}:{}", self.tool, params_json)
    }

    /// Fingerprint further scoped to the session, used by the hot dedup
    /// cache (same call seen on both the hook and streaming paths).
    pub fn session_fingerprint(&self) -> String {
        format!("{}:{}", self.session_key, self.fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_regardless_of_insertion_order() {
        let a = Action::new("exec", "s1")
            .with_param("command", "ls")
            .with_param("cwd", "/tmp");
        let b = Action::new("exec", "s1")
            .with_param("cwd", "/tmp")
            .with_param("command", "ls");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn exit_type_detection() {
        assert!(Action::new("exec", "s1").is_exit_type());
        assert!(!Action::new("read", "s1").is_exit_type());
    }
}
