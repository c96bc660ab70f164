use std::process::Command;

use super::parse::{parse_ps_output, parse_stats_output};
use super::{ContainerDescriptor, ContainerStats, CONTAINER_PREFIX};
use crate::runtime::RuntimeInfo;

/// Read-only access to the container runtime.
pub trait ContainerAdapter: Send + Sync {
    fn list_containers(&self, runtime: &RuntimeInfo) -> Result<Vec<ContainerDescriptor>, String>;
    fn stats(&self, runtime: &RuntimeInfo, names: &[String]) -> Result<Vec<ContainerStats>, String>;
    fn logs(&self, runtime: &RuntimeInfo, name: &str, tail_lines: usize) -> Result<String, String>;
    fn is_running(&self, runtime: &RuntimeInfo, name: &str) -> Result<bool, String>;
    fn image_exists(&self, runtime: &RuntimeInfo, tag: &str) -> Result<bool, String>;
}

/// Shells out to a Docker-compatible CLI with `--host` set to the resolved socket.
#[derive(Debug, Clone)]
pub struct CommandContainerAdapter {
    cli: String,
}

impl CommandContainerAdapter {
    pub fn new(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }

    fn run(&self, runtime: &RuntimeInfo, args: &[&str]) -> Result<CommandOutput, String> {
        let mut command = Command::new(&self.cli);
        if let Some(host) = runtime.docker_host() {
            command.arg("--host").arg(host);
        }
        let output = command
            .args(args)
            .output()
            .map_err(|err| format!("Failed to run {}: {}", self.cli, err))?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn run_ok(&self, runtime: &RuntimeInfo, args: &[&str]) -> Result<String, String> {
        let output = self.run(runtime, args)?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(output.failure(&self.cli, args))
        }
    }
}

impl Default for CommandContainerAdapter {
    fn default() -> Self {
        Self::new("docker")
    }
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn failure(&self, cli: &str, args: &[&str]) -> String {
        let subcommand = args.first().copied().unwrap_or_default();
        if self.stderr.is_empty() {
            format!("{} {} failed", cli, subcommand)
        } else {
            format!("{} {} failed: {}", cli, subcommand, self.stderr)
        }
    }

    fn is_missing_object(&self) -> bool {
        let stderr = self.stderr.to_ascii_lowercase();
        stderr.contains("no such") || stderr.contains("not found")
    }
}

impl ContainerAdapter for CommandContainerAdapter {
    fn list_containers(&self, runtime: &RuntimeInfo) -> Result<Vec<ContainerDescriptor>, String> {
        let filter = format!("name={}", CONTAINER_PREFIX);
        let stdout = self.run_ok(
            runtime,
            &[
                "ps",
                "-a",
                "--filter",
                &filter,
                "--format",
                "{{.Names}}\t{{.State}}\t{{.Status}}",
            ],
        )?;
        Ok(parse_ps_output(&stdout))
    }

    fn stats(&self, runtime: &RuntimeInfo, names: &[String]) -> Result<Vec<ContainerStats>, String> {
        let mut args = vec![
            "stats",
            "--no-stream",
            "--format",
            "{{.Name}}\t{{.CPUPerc}}\t{{.MemUsage}}",
        ];
        args.extend(names.iter().map(String::as_str));
        let stdout = self.run_ok(runtime, &args)?;
        Ok(parse_stats_output(&stdout))
    }

    fn logs(&self, runtime: &RuntimeInfo, name: &str, tail_lines: usize) -> Result<String, String> {
        let tail = tail_lines.to_string();
        let output = self.run(runtime, &["logs", "--tail", &tail, name])?;
        if !output.success {
            return Err(output.failure(&self.cli, &["logs"]));
        }
        // The CLI replays container stderr on its own stderr.
        let mut text = output.stdout;
        if !output.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&output.stderr);
        }
        Ok(text)
    }

    fn is_running(&self, runtime: &RuntimeInfo, name: &str) -> Result<bool, String> {
        let output = self.run(runtime, &["inspect", "--format", "{{.State.Running}}", name])?;
        if output.success {
            Ok(output.stdout.trim() == "true")
        } else if output.is_missing_object() {
            Ok(false)
        } else {
            Err(output.failure(&self.cli, &["inspect"]))
        }
    }

    fn image_exists(&self, runtime: &RuntimeInfo, tag: &str) -> Result<bool, String> {
        let output = self.run(runtime, &["image", "inspect", "--format", "{{.Id}}", tag])?;
        if output.success {
            Ok(true)
        } else if output.is_missing_object() {
            Ok(false)
        } else {
            Err(output.failure(&self.cli, &["image"]))
        }
    }
}
