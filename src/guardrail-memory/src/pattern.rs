//! Pure pattern-extraction function: `pattern(tool, commandStr) -> String`.
//!
//! Normalizes a raw command/JSON fingerprint into a canonical generalized
//! form so functionally-equivalent calls collapse to one pattern, while
//! deliberately keeping sensitive paths and filenames literal so that,
//! for example, `git push origin feature-foo` and `git push origin
//! feature-bar` share a pattern but `cat ~/.ssh/id_rsa` never shares one
//! with `cat ~/projects/file`.

use std::sync::LazyLock;

use regex::Regex;

const SENSITIVE_DIRS: &[&str] = &[".ssh", ".env", ".config", ".gnupg", ".aws"];
const SENSITIVE_FILES: &[&str] = &["authorized_keys", "id_rsa", ".bashrc", ".zshrc"];
const GIT_REF_SUBCOMMANDS: &[&str] = &["push", "pull", "checkout", "merge", "rebase"];

static HOME_DIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(/Users/[^/\s]+|/home/[^/\s]+)").unwrap());
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});
static HASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b[0-9a-f]{32,}\b").unwrap());
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{10,13}\b").unwrap());
static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}(T[\d:.]+Z?)?\b").unwrap());

/// Extract the generalized pattern for one tool call. Final form is
/// `"{tool}:{normalized}"`.
pub fn pattern(tool: &str, command_str: &str) -> String {
    let generic = normalize_generic(command_str);
    let normalized = match tool {
        "exec" => normalize_exec(&generic),
        "read" | "write" | "edit" => normalize_file_tool(&generic),
        _ => generic,
    };
    format!("{tool}:{normalized}")
}

fn normalize_generic(s: &str) -> String {
    let s = HOME_DIR_RE.replace_all(s, "~");
    let s = UUID_RE.replace_all(&s, "<uuid>");
    let s = HASH_RE.replace_all(&s, "<hash>");
    let s = ISO_DATE_RE.replace_all(&s, "<date>");
    let s = TIMESTAMP_RE.replace_all(&s, "<timestamp>");
    s.into_owned()
}

fn normalize_exec(raw: &str) -> String {
    let tokens: Vec<String> = shlex::split(raw).unwrap_or_else(|| raw.split_whitespace().map(String::from).collect());
    if tokens.is_empty() {
        return raw.to_string();
    }

    let program = tokens[0].as_str();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    out.push(program.to_string());

    match program {
        "cd" => {
            if tokens.len() > 1 {
                out.push("*".to_string());
                out.extend(tokens[2..].iter().cloned());
            }
        }
        "curl" | "wget" => {
            for t in &tokens[1..] {
                if t.starts_with("http://") || t.starts_with("https://") {
                    out.push(generalize_url(t));
                } else if looks_like_path(t) {
                    out.push(generalize_exec_path(t));
                } else {
                    out.push(t.clone());
                }
            }
        }
        "git" => {
            let subcommand = tokens.get(1).cloned().unwrap_or_default();
            out.push(subcommand.clone());
            let wildcard_refs = GIT_REF_SUBCOMMANDS.contains(&subcommand.as_str());
            let mut i = 2;
            while i < tokens.len() {
                let t = &tokens[i];
                if subcommand == "commit" && (t == "-m" || t == "--message") {
                    out.push(t.clone());
                    out.push("\"*\"".to_string());
                    i += 2;
                    continue;
                }
                if wildcard_refs && !t.starts_with('-') {
                    out.push("*".to_string());
                } else if looks_like_path(t) {
                    out.push(generalize_exec_path(t));
                } else {
                    out.push(t.clone());
                }
                i += 1;
            }
        }
        _ => {
            for t in &tokens[1..] {
                if looks_like_path(t) {
                    out.push(generalize_exec_path(t));
                } else {
                    out.push(t.clone());
                }
            }
        }
    }

    out.join(" ")
}

fn looks_like_path(token: &str) -> bool {
    token.starts_with('~') || token.starts_with('/') || token.starts_with("./")
}

fn generalize_url(url: &str) -> String {
    if let Some(rest) = url.split_once("://") {
        let (scheme, after_scheme) = rest;
        let host = after_scheme.split('/').next().unwrap_or(after_scheme);
        format!("{scheme}://{host}/*")
    } else {
        url.to_string()
    }
}

fn generalize_exec_path(path: &str) -> String {
    let trimmed = path.strip_prefix("~/").unwrap_or_else(|| path.trim_start_matches('/'));
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return path.to_string();
    }
    let prefix = if path.starts_with('~') { "~/" } else { "/" };

    if let Some(pos) = segments.iter().position(|s| SENSITIVE_DIRS.contains(s)) {
        let leaf = *segments.last().unwrap();
        let leaf_out = if SENSITIVE_FILES.contains(&leaf) || pos == segments.len() - 1 {
            leaf.to_string()
        } else {
            "*".to_string()
        };
        return format!("{prefix}{}/{leaf_out}", segments[pos]);
    }

    let leaf = *segments.last().unwrap();
    match segments.len() {
        1 => format!("{prefix}{leaf}"),
        2 => format!("{prefix}{}/{leaf}", segments[0]),
        _ => format!("{prefix}{}/*/{leaf}", segments[0]),
    }
}

/// For `read`/`write`/`edit`: reduce the path to `/*.ext` if the leaf has
/// an extension, otherwise fall back to the exec-style path
/// generalization (still useful for extension-less config files).
fn normalize_file_tool(path: &str) -> String {
    let leaf = path.rsplit('/').next().unwrap_or(path);
    if let Some(dot) = leaf.rfind('.') {
        if dot > 0 {
            return format!("/*{}", &leaf[dot..]);
        }
    }
    generalize_exec_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_push_collapses_branch_names() {
        assert_eq!(
            pattern("exec", "git push origin feature-foo"),
            pattern("exec", "git push origin feature-bar")
        );
    }

    #[test]
    fn ssh_key_read_does_not_collapse_with_project_file() {
        assert_ne!(
            pattern("exec", "cat ~/.ssh/id_rsa"),
            pattern("exec", "cat ~/projects/file")
        );
    }

    #[test]
    fn home_dir_is_generalized() {
        assert_eq!(pattern("exec", "cat /Users/alice/projects/a/b/file.txt").starts_with("exec:cat ~/"), true);
    }

    #[test]
    fn curl_url_keeps_host_wildcards_path() {
        let p = pattern("exec", "curl https://api.example.com/v1/users/123");
        assert_eq!(p, "exec:curl https://api.example.com/*");
    }

    #[test]
    fn write_reduces_to_extension_wildcard() {
        assert_eq!(pattern("write", "/Users/alice/project/config.env"), "write:/*.env");
    }

    #[test]
    fn cd_chain_is_wildcarded() {
        assert_eq!(pattern("exec", "cd /tmp"), "exec:cd *");
    }

    #[test]
    fn git_commit_message_is_wildcarded() {
        assert_eq!(
            pattern("exec", "git commit -m \"fix bug 1\""),
            pattern("exec", "git commit -m \"fix bug 2\"")
        );
    }

    #[test]
    fn pattern_extraction_is_idempotent_up_to_wildcard_compaction() {
        let once = pattern("exec", "git push origin feature-foo");
        let normalized_again = normalize_exec(once.strip_prefix("exec:").unwrap());
        assert_eq!(normalized_again, once.strip_prefix("exec:").unwrap());
    }
}
