//! Ticket-level workflow phase.
//!
//! The phase is recomputed from four independent snapshots on every read:
//! ticket status, the ticket's session record, review findings and the demo
//! script. Nothing is cached and no stored phase is ever read back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::TicketSessionRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    Started,
    Implementation,
    AiReview,
    HumanReview,
    Done,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Started => "started",
            WorkflowPhase::Implementation => "implementation",
            WorkflowPhase::AiReview => "ai_review",
            WorkflowPhase::HumanReview => "human_review",
            WorkflowPhase::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Backlog,
    Todo,
    InProgress,
    AiReview,
    HumanReview,
    Done,
}

impl TicketStatus {
    /// Accepts `in_progress`, `in-progress` and `In Progress` alike.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .map(|ch| match ch {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "backlog" => Some(TicketStatus::Backlog),
            "todo" => Some(TicketStatus::Todo),
            "in_progress" => Some(TicketStatus::InProgress),
            "ai_review" => Some(TicketStatus::AiReview),
            "human_review" => Some(TicketStatus::HumanReview),
            "done" => Some(TicketStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    Major,
    Minor,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub severity: FindingSeverity,
    #[serde(default)]
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoScript {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub approved: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub critical: u32,
    pub major: u32,
    pub minor: u32,
    pub suggestion: u32,
    pub fixed: u32,
    pub total: u32,
}

impl FindingsSummary {
    pub fn from_findings(findings: &[ReviewFinding]) -> Self {
        let mut summary = FindingsSummary::default();
        for finding in findings {
            match finding.severity {
                FindingSeverity::Critical => summary.critical += 1,
                FindingSeverity::Major => summary.major += 1,
                FindingSeverity::Minor => summary.minor += 1,
                FindingSeverity::Suggestion => summary.suggestion += 1,
            }
            if finding.fixed {
                summary.fixed += 1;
            }
        }
        summary.total = summary.critical + summary.major + summary.minor + summary.suggestion;
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDisplayState {
    pub current_phase: WorkflowPhase,
    pub review_iteration: u32,
    pub demo_generated: bool,
    pub demo_completed: bool,
    pub demo_approved: Option<bool>,
    pub findings_summary: FindingsSummary,
}

/// The four inputs of a derivation.
#[derive(Debug, Clone, Default)]
pub struct WorkflowSnapshots {
    pub status: TicketStatus,
    pub sessions: TicketSessionRecord,
    pub findings: Vec<ReviewFinding>,
    pub demo: Option<DemoScript>,
}

pub fn derive_display_state(snapshots: &WorkflowSnapshots) -> WorkflowDisplayState {
    let current_phase = match snapshots.status {
        TicketStatus::Done => WorkflowPhase::Done,
        TicketStatus::HumanReview => WorkflowPhase::HumanReview,
        TicketStatus::AiReview => WorkflowPhase::AiReview,
        TicketStatus::InProgress if snapshots.sessions.session_observed() => {
            WorkflowPhase::Implementation
        }
        _ => WorkflowPhase::Started,
    };

    WorkflowDisplayState {
        current_phase,
        review_iteration: snapshots.sessions.review_iteration(),
        demo_generated: snapshots.demo.is_some(),
        demo_completed: snapshots.demo.as_ref().is_some_and(|demo| demo.completed),
        demo_approved: snapshots.demo.as_ref().and_then(|demo| demo.approved),
        findings_summary: FindingsSummary::from_findings(&snapshots.findings),
    }
}

/// Read side of the ticket board.
pub trait WorkflowSources {
    fn ticket_status(&self, ticket_id: &str) -> Result<TicketStatus, String>;
    fn session_record(&self, ticket_id: &str) -> Result<TicketSessionRecord, String>;
    fn review_findings(&self, ticket_id: &str) -> Result<Vec<ReviewFinding>, String>;
    fn demo_script(&self, ticket_id: &str) -> Result<Option<DemoScript>, String>;
}

/// Reads all four snapshots and derives the display state. A failing source
/// contributes its default instead of failing the whole read.
pub fn derive<S: WorkflowSources + ?Sized>(ticket_id: &str, sources: &S) -> WorkflowDisplayState {
    let snapshots = WorkflowSnapshots {
        status: or_default(ticket_id, "ticket status", sources.ticket_status(ticket_id)),
        sessions: or_default(ticket_id, "session record", sources.session_record(ticket_id)),
        findings: or_default(ticket_id, "review findings", sources.review_findings(ticket_id)),
        demo: or_default(ticket_id, "demo script", sources.demo_script(ticket_id)),
    };
    derive_display_state(&snapshots)
}

fn or_default<T: Default>(ticket_id: &str, source: &str, value: Result<T, String>) -> T {
    value.unwrap_or_else(|err| {
        warn!(%ticket_id, source, error = %err, "Workflow source unavailable, using default");
        T::default()
    })
}

/// Write side of the ticket board.
pub trait TicketStore {
    fn workflow_phase(&self, ticket_id: &str) -> Result<Option<WorkflowPhase>, String>;
    fn set_workflow_phase(&self, ticket_id: &str, phase: WorkflowPhase) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSync {
    pub state: WorkflowDisplayState,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Derives the phase and writes it to the store only when it changed.
pub fn sync_workflow_state<S, T>(ticket_id: &str, sources: &S, store: &T) -> WorkflowSync
where
    S: WorkflowSources + ?Sized,
    T: TicketStore + ?Sized,
{
    let state = derive(ticket_id, sources);
    let phase = state.current_phase;

    match store.workflow_phase(ticket_id) {
        Ok(Some(stored)) if stored == phase => {
            debug!(%ticket_id, phase = phase.as_str(), "Workflow phase unchanged");
            return WorkflowSync {
                state,
                written: false,
                error: None,
            };
        }
        Ok(_) => {}
        Err(err) => {
            debug!(%ticket_id, error = %err, "Stored workflow phase unreadable, writing anyway");
        }
    }

    match store.set_workflow_phase(ticket_id, phase) {
        Ok(()) => {
            info!(%ticket_id, phase = phase.as_str(), "Workflow phase updated");
            WorkflowSync {
                state,
                written: true,
                error: None,
            }
        }
        Err(err) => {
            warn!(%ticket_id, error = %err, "Failed to write workflow phase");
            WorkflowSync {
                state,
                written: false,
                error: Some(err),
            }
        }
    }
}
