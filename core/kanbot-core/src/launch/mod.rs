//! Launch planning for agent sessions.
//!
//! [`plan`] turns a launch request into the ordered shell commands an external
//! process launcher runs. It performs no I/O and never executes anything.
//!
//! ## Modes
//!
//! ```text
//! terminal → cd, exports, agent command, keep-open tail
//! sandbox  → cd, `<cli> --host <socket> run ...` with the sandbox image, keep-open tail
//! ```
//!
//! Neither script enables fail-fast shell options: when the agent exits, the
//! window must stay open so the user can read its output.

mod escape;

pub use escape::{escape_double_quoted, quote};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::KanbotConfig;
use crate::containers::container_name_for;
use crate::runtime::RuntimeInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    Terminal,
    Sandbox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Ticket,
    Epic,
}

impl TargetKind {
    fn label(&self) -> &'static str {
        match self {
            TargetKind::Ticket => "ticket",
            TargetKind::Epic => "epic",
        }
    }
}

/// What a session works on and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchTarget {
    pub kind: TargetKind,
    pub id: String,
    pub title: String,
    pub session_id: String,
    pub worktree: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
    pub mode: LaunchMode,
    pub command_sequence: Vec<String>,
    pub timeout_seconds: u64,
    pub max_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
}

impl LaunchPlan {
    /// Newline-joined script for launchers that take a single string.
    pub fn script(&self) -> String {
        self.command_sequence.join("\n")
    }
}

const SANDBOX_WORKDIR: &str = "/workspace";

pub fn plan(
    target: &LaunchTarget,
    mode: LaunchMode,
    runtime: &RuntimeInfo,
    platform: Platform,
    config: &KanbotConfig,
) -> LaunchPlan {
    let launch = &config.launch;
    let worktree = target.worktree.to_string_lossy();
    let agent = agent_invocation(target, config);

    let mut commands = vec![format!("cd {}", quote(&worktree))];
    let container_name = match mode {
        LaunchMode::Terminal => {
            for (key, value) in session_env(target, mode, config) {
                commands.push(format!("export {}={}", key, value));
            }
            commands.push(agent);
            None
        }
        LaunchMode::Sandbox => {
            let name = container_name_for(&target.id, &target.session_id);
            commands.push(sandbox_run(target, runtime, platform, config, &name, &agent));
            Some(name)
        }
    };
    commands.extend(keep_open_tail());

    LaunchPlan {
        mode,
        command_sequence: commands,
        timeout_seconds: launch.timeout_seconds,
        max_iterations: launch.max_iterations,
        container_name,
    }
}

fn prompt_for(target: &LaunchTarget) -> String {
    format!(
        "Work on {} {}: {}",
        target.kind.label(),
        target.id,
        target.title.trim()
    )
}

fn agent_invocation(target: &LaunchTarget, config: &KanbotConfig) -> String {
    let mut parts = vec![quote(&config.launch.agent_command)];
    parts.extend(config.launch.agent_args.iter().map(|arg| quote(arg)));
    parts.push(quote(&prompt_for(target)));
    parts.join(" ")
}

fn session_env(
    target: &LaunchTarget,
    mode: LaunchMode,
    config: &KanbotConfig,
) -> Vec<(&'static str, String)> {
    let mode = match mode {
        LaunchMode::Terminal => "terminal",
        LaunchMode::Sandbox => "sandbox",
    };
    vec![
        ("KANBOT_TICKET_ID", quote(&target.id)),
        ("KANBOT_SESSION_ID", quote(&target.session_id)),
        ("KANBOT_SESSION_MODE", mode.to_string()),
        (
            "KANBOT_MAX_ITERATIONS",
            config.launch.max_iterations.to_string(),
        ),
        (
            "KANBOT_TIMEOUT_SECONDS",
            config.launch.timeout_seconds.to_string(),
        ),
    ]
}

fn sandbox_run(
    target: &LaunchTarget,
    runtime: &RuntimeInfo,
    platform: Platform,
    config: &KanbotConfig,
    container_name: &str,
    agent: &str,
) -> String {
    let worktree = target.worktree.to_string_lossy();
    let mut parts = vec![quote(&config.containers.cli)];
    if let Some(host) = runtime.docker_host() {
        parts.push("--host".to_string());
        parts.push(quote(&host));
    }
    parts.extend(
        [
            "run",
            "--rm",
            "-it",
            "--name",
            container_name,
            "--label",
        ]
        .iter()
        .map(|part| part.to_string()),
    );
    parts.push(quote(&format!("kanbot.ticket={}", target.id)));
    parts.push("-v".to_string());
    parts.push(quote(&format!("{}:{}", worktree, SANDBOX_WORKDIR)));
    parts.push("-w".to_string());
    parts.push(SANDBOX_WORKDIR.to_string());

    for (key, value) in session_env(target, LaunchMode::Sandbox, config) {
        parts.push("-e".to_string());
        parts.push(format!("{}={}", key, value));
    }

    if platform == Platform::Linux {
        // Docker Desktop provides host.docker.internal; native Linux engines do not.
        parts.push("--add-host".to_string());
        parts.push("host.docker.internal:host-gateway".to_string());
        parts.push("--user".to_string());
        parts.push("\"$(id -u):$(id -g)\"".to_string());
    }

    parts.push(quote(&config.launch.image_tag));
    parts.push(agent.to_string());
    parts.join(" ")
}

fn keep_open_tail() -> Vec<String> {
    vec![
        "agent_exit=$?".to_string(),
        "echo \"\"".to_string(),
        "echo \"Session finished with exit code ${agent_exit}. Press Enter to close.\"".to_string(),
        "read -r _".to_string(),
    ]
}
