//! Deciding which processes in a snapshot belong to a logical service.

use super::snapshot::{ProcessRecord, Snapshot};
use serde::{Deserialize, Serialize};

/// How a logical service is recognised in the process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRule {
    /// Process name contains `name` (case-insensitive) and the command line
    /// has `token` as one of its exact tokens, e.g. a `serve` subcommand.
    NameAndToken { name: String, token: String },
    /// Some command-line token contains `needle`.
    CmdlineSubstring { needle: String },
}

impl MatchRule {
    /// Whether `record` belongs to the service this rule describes.
    pub fn matches(&self, record: &ProcessRecord) -> bool {
        // No command line, no match
        if record.cmdline.is_empty() {
            return false;
        }

        match self {
            MatchRule::NameAndToken { name, token } => {
                record.name.to_lowercase().contains(&name.to_lowercase())
                    && record.cmdline.iter().any(|t| t == token)
            }
            MatchRule::CmdlineSubstring { needle } => {
                record.cmdline.iter().any(|t| t.contains(needle.as_str()))
            }
        }
    }

    /// Rules with an empty pattern would match everything or nothing.
    pub fn is_well_formed(&self) -> bool {
        match self {
            MatchRule::NameAndToken { name, token } => {
                !name.trim().is_empty() && !token.trim().is_empty()
            }
            MatchRule::CmdlineSubstring { needle } => !needle.trim().is_empty(),
        }
    }
}

/// The witness: first matching process in enumeration order.
pub fn find<'a>(snapshot: &'a Snapshot, rule: &MatchRule) -> Option<&'a ProcessRecord> {
    snapshot.iter().find(|record| rule.matches(record))
}

/// Every matching process, in enumeration order.
pub fn find_all<'a>(snapshot: &'a Snapshot, rule: &MatchRule) -> Vec<&'a ProcessRecord> {
    snapshot.iter().filter(|record| rule.matches(record)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_rule() -> MatchRule {
        MatchRule::NameAndToken {
            name: "ollama".into(),
            token: "serve".into(),
        }
    }

    #[test]
    fn test_name_and_token() {
        let rule = serve_rule();

        let server = ProcessRecord::new(10, "Ollama").with_cmdline(["ollama", "serve"]);
        assert!(rule.matches(&server));

        // Shares the name but is a client invocation
        let client = ProcessRecord::new(11, "ollama").with_cmdline(["ollama", "run", "llama3"]);
        assert!(!rule.matches(&client));

        // Token must be exact, not a substring
        let other = ProcessRecord::new(12, "ollama").with_cmdline(["ollama", "server"]);
        assert!(!rule.matches(&other));

        // Token present but name does not match
        let unrelated = ProcessRecord::new(13, "python").with_cmdline(["python", "serve"]);
        assert!(!rule.matches(&unrelated));
    }

    #[test]
    fn test_cmdline_substring() {
        let rule = MatchRule::CmdlineSubstring {
            needle: "invokeai-web".into(),
        };

        let launcher = ProcessRecord::new(20, "python3")
            .with_cmdline(["/usr/bin/python3", "/opt/invoke/.venv/bin/invokeai-web"]);
        assert!(rule.matches(&launcher));

        let other = ProcessRecord::new(21, "python3").with_cmdline(["python3", "app.py"]);
        assert!(!rule.matches(&other));
    }

    #[test]
    fn test_empty_cmdline_never_matches() {
        let record = ProcessRecord::new(30, "ollama");
        assert!(!serve_rule().matches(&record));
        assert!(!MatchRule::CmdlineSubstring {
            needle: "ollama".into()
        }
        .matches(&record));
    }

    #[test]
    fn test_find_returns_first_in_pid_order() {
        let snapshot = Snapshot::new(vec![
            ProcessRecord::new(50, "ollama").with_cmdline(["ollama", "serve"]),
            ProcessRecord::new(5, "bash").with_cmdline(["bash"]),
            ProcessRecord::new(40, "ollama").with_cmdline(["ollama", "serve"]),
        ]);

        let rule = serve_rule();
        assert_eq!(find(&snapshot, &rule).map(|r| r.pid), Some(40));

        let all: Vec<u32> = find_all(&snapshot, &rule).iter().map(|r| r.pid).collect();
        assert_eq!(all, vec![40, 50]);
    }

    #[test]
    fn test_find_without_matches() {
        let snapshot = Snapshot::new(vec![ProcessRecord::new(1, "init").with_cmdline(["init"])]);
        assert!(find(&snapshot, &serve_rule()).is_none());
        assert!(find_all(&snapshot, &serve_rule()).is_empty());
    }

    #[test]
    fn test_rule_deserialize() {
        let rule: MatchRule = serde_json::from_str(
            r#"{ "kind": "cmdline_substring", "needle": "invokeai-web" }"#,
        )
        .unwrap();
        assert_eq!(
            rule,
            MatchRule::CmdlineSubstring {
                needle: "invokeai-web".into()
            }
        );
    }
}
