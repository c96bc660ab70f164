//! Pre-tool-use review gate hook.
//!
//! Reads the hook JSON from stdin (or takes `--command` directly) and asks the
//! core gate whether the shell command may run. A block prints remediation to
//! stderr and exits 2, which the agent harness treats as "deny with reason".
//! Anything unreadable is allowed.

use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use kanbot_core::review_gate::{GateDecision, ReviewGate};
use kanbot_core::KanbotConfig;
use kanbot_protocol::HookInput;

pub const BLOCK_EXIT_CODE: i32 = 2;

pub struct GateOutcome {
    pub exit_code: i32,
    pub stderr: Option<String>,
}

pub fn run(config: &KanbotConfig, command: Option<String>, worktree: Option<PathBuf>) -> GateOutcome {
    let (command, cwd) = match command {
        Some(command) => (command, None),
        None => match read_stdin_command() {
            Some(found) => found,
            None => return allow(),
        },
    };

    let worktree = worktree
        .or(cwd)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    evaluate(config, &command, &worktree)
}

fn evaluate(config: &KanbotConfig, command: &str, worktree: &Path) -> GateOutcome {
    match ReviewGate::from_config(&config.review_gate).evaluate(command, worktree) {
        GateDecision::Allow { reason } => {
            tracing::debug!(?reason, "Gate allowed command");
            allow()
        }
        GateDecision::Block(blocked) => GateOutcome {
            exit_code: BLOCK_EXIT_CODE,
            stderr: Some(blocked.to_string()),
        },
    }
}

fn allow() -> GateOutcome {
    GateOutcome {
        exit_code: 0,
        stderr: None,
    }
}

/// Bash command and cwd from the hook input, if this is a Bash tool call.
fn read_stdin_command() -> Option<(String, Option<PathBuf>)> {
    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        tracing::warn!(error = %err, "Failed to read hook stdin, allowing");
        return None;
    }
    parse_hook_input(&input)
}

fn parse_hook_input(input: &str) -> Option<(String, Option<PathBuf>)> {
    if input.trim().is_empty() {
        return None;
    }
    let hook_input: HookInput = match serde_json::from_str(input) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to parse hook input, allowing");
            return None;
        }
    };
    let command = hook_input.shell_command()?.to_string();
    let cwd = hook_input
        .cwd
        .filter(|cwd| !cwd.trim().is_empty())
        .map(PathBuf::from);
    Some((command, cwd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_bash_hook_input() {
        let parsed = parse_hook_input(
            r#"{"hook_event_name":"PreToolUse","tool_name":"Bash","cwd":"/wt","tool_input":{"command":"git push"}}"#,
        );
        assert_eq!(
            parsed,
            Some(("git push".to_string(), Some(PathBuf::from("/wt"))))
        );
    }

    #[test]
    fn ignores_other_tools_and_garbage() {
        assert_eq!(
            parse_hook_input(r#"{"tool_name":"Edit","tool_input":{"file_path":"a.rs"}}"#),
            None
        );
        assert_eq!(parse_hook_input("not json"), None);
        assert_eq!(parse_hook_input("   "), None);
    }

    #[test]
    fn non_publish_command_exits_zero() {
        let dir = tempdir().unwrap();
        let outcome = evaluate(&KanbotConfig::default(), "ls -la", dir.path());
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stderr.is_none());
    }
}
