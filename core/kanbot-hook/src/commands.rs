//! Query subcommands. Each prints one JSON document on stdout.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use kanbot_core::containers::{CommandContainerAdapter, LifecycleMonitor};
use kanbot_core::events::TicketSessionRecord;
use kanbot_core::launch::{plan, LaunchMode, LaunchTarget, Platform, TargetKind};
use kanbot_core::services::{manifest_path, read_manifest};
use kanbot_core::sessions::session_overview;
use kanbot_core::workflow::{derive, DemoScript, ReviewFinding, TicketStatus, WorkflowSources};
use kanbot_core::{EventLog, KanbotConfig, RuntimeInfo, RuntimeResolver, StorageConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct Context {
    pub storage: StorageConfig,
    pub config: KanbotConfig,
}

impl Context {
    fn runtime(&self, force_refresh: bool) -> Arc<RuntimeInfo> {
        RuntimeResolver::from_config(&self.config.runtime).resolve(force_refresh)
    }

    fn monitor(&self) -> LifecycleMonitor {
        LifecycleMonitor::new(CommandContainerAdapter::new(self.config.containers.cli.clone()))
    }

    fn event_log(&self) -> Result<EventLog, String> {
        EventLog::new(self.storage.events_db()).map_err(String::from)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to render output: {}", err))?;
    println!("{}", rendered);
    Ok(())
}

pub fn runtime(ctx: &Context, refresh: bool) -> Result<(), String> {
    print_json(ctx.runtime(refresh).as_ref())
}

pub struct PlanArgs {
    pub id: String,
    pub title: String,
    pub session_id: String,
    pub worktree: PathBuf,
    pub epic: bool,
    pub mode: LaunchMode,
    pub script: bool,
}

pub fn plan_launch(ctx: &Context, args: PlanArgs) -> Result<(), String> {
    let target = LaunchTarget {
        kind: if args.epic {
            TargetKind::Epic
        } else {
            TargetKind::Ticket
        },
        id: args.id,
        title: args.title,
        session_id: args.session_id,
        worktree: args.worktree,
    };
    let runtime = match args.mode {
        LaunchMode::Sandbox => ctx.runtime(false),
        LaunchMode::Terminal => Arc::new(RuntimeInfo::unavailable()),
    };
    if args.mode == LaunchMode::Sandbox && !runtime.running {
        tracing::warn!(kind = runtime.kind.as_str(), "Planning sandbox launch without a running runtime");
    }

    let launch = plan(&target, args.mode, &runtime, Platform::current(), &ctx.config);
    if args.script {
        println!("{}", launch.script());
        Ok(())
    } else {
        print_json(&launch)
    }
}

pub fn containers(ctx: &Context) -> Result<(), String> {
    print_json(&ctx.monitor().list_containers(&ctx.runtime(false)))
}

pub fn stats(ctx: &Context, names: Vec<String>) -> Result<(), String> {
    let names = (!names.is_empty()).then_some(names);
    print_json(&ctx.monitor().stats(&ctx.runtime(false), names.as_deref()))
}

pub fn logs(ctx: &Context, name: &str, tail: Option<usize>) -> Result<(), String> {
    let tail = tail.unwrap_or(ctx.config.containers.log_tail_lines);
    print_json(&ctx.monitor().logs(&ctx.runtime(false), name, tail))
}

pub fn image(ctx: &Context, tag: Option<String>) -> Result<(), String> {
    let tag = tag.unwrap_or_else(|| ctx.config.launch.image_tag.clone());
    print_json(&ctx.monitor().image_ready(&ctx.runtime(false), &tag))
}

/// Appends one event read from stdin as wire JSON.
pub fn append(ctx: &Context) -> Result<(), String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|err| format!("Failed to read stdin: {}", err))?;
    let raw: serde_json::Value =
        serde_json::from_str(&input).map_err(|err| format!("Failed to parse event: {}", err))?;
    let event = kanbot_protocol::parse_event(raw).map_err(|err| err.to_string())?;

    let inserted = ctx.event_log()?.append(&event).map_err(String::from)?;
    tracing::info!(
        session_id = %event.session_id,
        sequence_id = %event.sequence_id,
        event_type = event.event_type.as_str(),
        inserted,
        "Event appended"
    );
    print_json(&serde_json::json!({ "inserted": inserted }))
}

pub fn fold(ctx: &Context, session_id: &str, container: Option<String>) -> Result<(), String> {
    let log = ctx.event_log()?;
    match container {
        Some(name) => {
            let overview = session_overview(
                &log,
                &ctx.monitor(),
                &ctx.runtime(false),
                session_id,
                Some(&name),
                ctx.config.containers.log_tail_lines,
            )
            .map_err(String::from)?;
            print_json(&overview)
        }
        None => print_json(&log.fold_summary(session_id).map_err(String::from)?),
    }
}

struct CliSources {
    log: Result<EventLog, String>,
    status: TicketStatus,
    findings: Option<PathBuf>,
    demo: Option<PathBuf>,
}

impl WorkflowSources for CliSources {
    fn ticket_status(&self, _: &str) -> Result<TicketStatus, String> {
        Ok(self.status)
    }

    fn session_record(&self, ticket_id: &str) -> Result<TicketSessionRecord, String> {
        match &self.log {
            Ok(log) => log.ticket_session_record(ticket_id).map_err(String::from),
            Err(err) => Err(err.clone()),
        }
    }

    fn review_findings(&self, _: &str) -> Result<Vec<ReviewFinding>, String> {
        match &self.findings {
            Some(path) => read_json(path),
            None => Ok(Vec::new()),
        }
    }

    fn demo_script(&self, _: &str) -> Result<Option<DemoScript>, String> {
        match &self.demo {
            Some(path) => read_json(path).map(Some),
            None => Ok(None),
        }
    }
}

pub fn phase(
    ctx: &Context,
    ticket_id: &str,
    status: TicketStatus,
    findings: Option<PathBuf>,
    demo: Option<PathBuf>,
) -> Result<(), String> {
    let sources = CliSources {
        log: ctx.event_log(),
        status,
        findings,
        demo,
    };
    print_json(&derive(ticket_id, &sources))
}

pub fn services(ctx: &Context, worktree: &Path) -> Result<(), String> {
    let path = manifest_path(worktree, &ctx.config.services);
    print_json(&read_manifest(&path, Utc::now()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = fs_err::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanbot_core::workflow::WorkflowPhase;
    use tempfile::tempdir;

    #[test]
    fn cli_sources_read_findings_and_demo_files() {
        let dir = tempdir().unwrap();
        let findings = dir.path().join("findings.json");
        let demo = dir.path().join("demo.json");
        std::fs::write(
            &findings,
            r#"[{"severity":"critical","fixed":true},{"severity":"minor"}]"#,
        )
        .unwrap();
        std::fs::write(&demo, r#"{"completed":true,"approved":true}"#).unwrap();

        let sources = CliSources {
            log: EventLog::new(dir.path().join("events.db")).map_err(String::from),
            status: TicketStatus::HumanReview,
            findings: Some(findings),
            demo: Some(demo),
        };
        let state = derive("TCK-1", &sources);
        assert_eq!(state.current_phase, WorkflowPhase::HumanReview);
        assert_eq!(state.findings_summary.total, 2);
        assert_eq!(state.findings_summary.fixed, 1);
        assert_eq!(state.demo_approved, Some(true));
    }

    #[test]
    fn unreadable_sources_fall_back() {
        let dir = tempdir().unwrap();
        let sources = CliSources {
            log: Err("no event log".to_string()),
            status: TicketStatus::InProgress,
            findings: Some(dir.path().join("missing.json")),
            demo: None,
        };
        let state = derive("TCK-1", &sources);
        assert_eq!(state.current_phase, WorkflowPhase::Started);
        assert_eq!(state.findings_summary.total, 0);
    }
}
