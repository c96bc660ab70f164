//! One-call view of a session for dashboards.

use serde::Serialize;

use crate::containers::{ContainerAdapter, ContainerDescriptor, IterationProgress, LifecycleMonitor};
use crate::error::Result;
use crate::events::{EventLog, FoldSummary};
use crate::runtime::RuntimeInfo;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverview {
    pub summary: FoldSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<IterationProgress>,
}

/// Folds the session and, for sandbox sessions, attaches container state and
/// the latest iteration progress. Container failures leave those fields empty.
pub fn session_overview<A: ContainerAdapter>(
    log: &EventLog,
    monitor: &LifecycleMonitor<A>,
    runtime: &RuntimeInfo,
    session_id: &str,
    container_name: Option<&str>,
    tail_lines: usize,
) -> Result<SessionOverview> {
    let summary = log.fold_summary(session_id)?;

    let Some(name) = container_name else {
        return Ok(SessionOverview {
            summary,
            container: None,
            progress: None,
        });
    };

    let container = monitor
        .list_containers(runtime)
        .containers
        .into_iter()
        .find(|container| container.name == name);
    let progress = container
        .as_ref()
        .and_then(|_| monitor.logs(runtime, name, tail_lines).progress);

    Ok(SessionOverview {
        summary,
        container,
        progress,
    })
}
