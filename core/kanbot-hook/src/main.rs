//! kanbot-hook: review gate hook and session orchestration CLI.
//!
//! ## Subcommands
//!
//! - `gate`: pre-tool-use hook; reads hook JSON from stdin, exits 2 to block a publish
//! - `runtime`, `containers`, `stats`, `logs`, `image`: runtime and container queries
//! - `plan`: prints a launch plan (JSON, or the raw script)
//! - `append`, `fold`: write to and replay the session event log
//! - `phase`: derive a ticket's workflow phase
//! - `services`: read a worktree's service manifest

mod commands;
mod gate;
mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use commands::{Context, PlanArgs};
use kanbot_core::launch::LaunchMode;
use kanbot_core::workflow::TicketStatus;
use kanbot_core::{load_config_or_default, CONFIG_ENV, StorageConfig};

#[derive(Parser)]
#[command(name = "kanbot-hook")]
#[command(about = "Kanbot session orchestration and review gate")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $KANBOT_CONFIG, then ~/.kanbot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Terminal,
    Sandbox,
}

impl From<ModeArg> for LaunchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Terminal => LaunchMode::Terminal,
            ModeArg::Sandbox => LaunchMode::Sandbox,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Review gate hook (reads JSON from stdin unless --command is given)
    Gate {
        /// Shell command to check instead of reading hook input
        #[arg(long)]
        command: Option<String>,

        /// Worktree to diff (defaults to the hook's cwd)
        #[arg(long)]
        worktree: Option<PathBuf>,
    },

    /// Resolve the container runtime
    Runtime {
        /// Bypass the cache and probe again
        #[arg(long)]
        refresh: bool,
    },

    /// Build a launch plan for a ticket or epic
    Plan {
        #[arg(long)]
        id: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        session: String,

        #[arg(long)]
        worktree: PathBuf,

        /// Target is an epic rather than a ticket
        #[arg(long)]
        epic: bool,

        #[arg(long, value_enum, default_value = "terminal")]
        mode: ModeArg,

        /// Print the shell script instead of JSON
        #[arg(long)]
        script: bool,
    },

    /// List session containers
    Containers,

    /// Resource usage of session containers (all running ones if none named)
    Stats {
        #[arg(value_name = "NAME")]
        names: Vec<String>,
    },

    /// Tail a session container's logs
    Logs {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long)]
        tail: Option<usize>,
    },

    /// Check whether the sandbox image exists locally
    Image {
        /// Image tag (defaults to the configured sandbox image)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Append a session event (wire JSON on stdin)
    Append,

    /// Replay a session's events
    Fold {
        #[arg(value_name = "SESSION_ID")]
        session_id: String,

        /// Attach state and progress of this sandbox container
        #[arg(long)]
        container: Option<String>,
    },

    /// Derive a ticket's workflow phase
    Phase {
        #[arg(value_name = "TICKET_ID")]
        ticket_id: String,

        /// Current ticket status (e.g. in_progress, ai_review, done)
        #[arg(long, value_parser = parse_status)]
        status: TicketStatus,

        /// JSON array of review findings
        #[arg(long)]
        findings: Option<PathBuf>,

        /// JSON demo script record
        #[arg(long)]
        demo: Option<PathBuf>,
    },

    /// Read a worktree's service manifest
    Services {
        #[arg(long, default_value = ".")]
        worktree: PathBuf,
    },
}

fn parse_status(value: &str) -> Result<TicketStatus, String> {
    TicketStatus::parse(value).ok_or_else(|| format!("unknown ticket status: {}", value))
}

fn main() {
    let cli = Cli::parse();

    let storage = StorageConfig::resolve();
    let logs_dir = storage.as_ref().ok().map(StorageConfig::logs_dir);
    let logging_guard = logging::init(logs_dir.as_deref());

    let code = match storage {
        Ok(storage) => run(cli, storage),
        // The gate must never block on its own failure.
        Err(err) if matches!(cli.command, Commands::Gate { .. }) => {
            tracing::warn!(error = %err, "No storage root, gate allowing");
            0
        }
        Err(err) => {
            eprintln!("kanbot-hook: {}", err);
            1
        }
    };

    drop(logging_guard);
    std::process::exit(code);
}

fn run(cli: Cli, storage: StorageConfig) -> i32 {
    let config_path = cli
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| storage.config_file());
    let config = load_config_or_default(Some(config_path));
    let ctx = Context { storage, config };

    let result = match cli.command {
        Commands::Gate { command, worktree } => {
            let outcome = gate::run(&ctx.config, command, worktree);
            if let Some(message) = outcome.stderr {
                eprintln!("{}", message);
            }
            return outcome.exit_code;
        }
        Commands::Runtime { refresh } => commands::runtime(&ctx, refresh),
        Commands::Plan {
            id,
            title,
            session,
            worktree,
            epic,
            mode,
            script,
        } => commands::plan_launch(
            &ctx,
            PlanArgs {
                id,
                title,
                session_id: session,
                worktree,
                epic,
                mode: mode.into(),
                script,
            },
        ),
        Commands::Containers => commands::containers(&ctx),
        Commands::Stats { names } => commands::stats(&ctx, names),
        Commands::Logs { name, tail } => commands::logs(&ctx, &name, tail),
        Commands::Image { tag } => commands::image(&ctx, tag),
        Commands::Append => commands::append(&ctx),
        Commands::Fold {
            session_id,
            container,
        } => commands::fold(&ctx, &session_id, container),
        Commands::Phase {
            ticket_id,
            status,
            findings,
            demo,
        } => commands::phase(&ctx, &ticket_id, status, findings, demo),
        Commands::Services { worktree } => commands::services(&ctx, &worktree),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "kanbot-hook command failed");
            eprintln!("kanbot-hook: {}", err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_phase_status() {
        let cli = Cli::try_parse_from(["kanbot-hook", "phase", "TCK-1", "--status", "in-progress"])
            .expect("parse");
        match cli.command {
            Commands::Phase { status, .. } => assert_eq!(status, TicketStatus::InProgress),
            _ => panic!("expected phase"),
        }
        assert!(Cli::try_parse_from(["kanbot-hook", "phase", "TCK-1", "--status", "archived"]).is_err());
    }
}
