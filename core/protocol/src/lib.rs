//! Wire types shared by Kanbot session writers and readers.
//!
//! Sessions append events and write a service manifest; the core reads both.
//! Keeping the schema in its own crate lets the writer side (the agent harness
//! inside a sandbox) reuse the same types and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_ID_LEN: usize = 128;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Start,
    StateChange,
    ToolCall,
    ToolResult,
    Prompt,
    End,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "start",
            EventType::StateChange => "state_change",
            EventType::ToolCall => "tool_call",
            EventType::ToolResult => "tool_result",
            EventType::Prompt => "prompt",
            EventType::End => "end",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(EventType::Start),
            "state_change" => Some(EventType::StateChange),
            "tool_call" => Some(EventType::ToolCall),
            "tool_result" => Some(EventType::ToolResult),
            "prompt" => Some(EventType::Prompt),
            "end" => Some(EventType::End),
            _ => None,
        }
    }
}

/// One entry of a session's append-only history.
///
/// `sequence_id` must sort lexicographically in emission order; the session
/// process is the single authority that assigns it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub session_id: String,
    pub sequence_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Value,
    pub created_at: String,
}

impl SessionEvent {
    /// The `state` field of a `state_change` payload.
    pub fn reported_state(&self) -> Option<&str> {
        if self.event_type != EventType::StateChange {
            return None;
        }
        self.payload.get("state").and_then(Value::as_str)
    }

    /// Ticket or epic the session works on, carried by the `start` payload.
    pub fn ticket_id(&self) -> Option<&str> {
        self.payload
            .get("ticket_id")
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Review round reported by a `state_change` payload.
    pub fn review_iteration(&self) -> Option<u32> {
        self.payload
            .get("review_iteration")
            .and_then(Value::as_u64)
            .map(|value| u32::try_from(value).unwrap_or(u32::MAX))
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_id(&self.session_id, "session_id")?;
        require_id(&self.sequence_id, "sequence_id")?;

        if DateTime::parse_from_rfc3339(&self.created_at).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "created_at must be RFC3339",
            ));
        }

        if self.event_type == EventType::StateChange {
            match self.reported_state() {
                Some(state) if !state.trim().is_empty() => {}
                _ => {
                    return Err(ErrorInfo::new(
                        "missing_field",
                        "state_change payload requires a non-empty state",
                    ))
                }
            }
        }

        Ok(())
    }
}

pub fn parse_event(raw: Value) -> Result<SessionEvent, ErrorInfo> {
    let event: SessionEvent = serde_json::from_value(raw).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    event.validate()?;
    Ok(event)
}

fn require_id(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    if value.len() > MAX_ID_LEN {
        return Err(ErrorInfo::new(
            "invalid_id",
            format!("{} must be {} characters or fewer", field, MAX_ID_LEN),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Service manifest
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Frontend,
    Backend,
    Storybook,
    Docs,
    Database,
    Other,
}

impl ServiceType {
    /// Port range reserved for this service type, if any.
    pub fn port_range(&self) -> Option<std::ops::RangeInclusive<u16>> {
        match self {
            ServiceType::Frontend => Some(3000..=3999),
            ServiceType::Docs => Some(4000..=4999),
            ServiceType::Storybook => Some(6000..=6999),
            ServiceType::Backend => Some(8000..=8999),
            ServiceType::Database | ServiceType::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Starting,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub port: u16,
    pub status: ServiceStatus,
    #[serde(default)]
    pub health_endpoint: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl ServiceDescriptor {
    pub fn port_in_range(&self) -> bool {
        self.service_type
            .port_range()
            .map(|range| range.contains(&self.port))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceManifest {
    pub services: Vec<ServiceDescriptor>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceManifest {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            services: Vec::new(),
            updated_at: now,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent hook input
// ─────────────────────────────────────────────────────────────────────────────

/// JSON an agent harness pipes to a pre-tool-use hook.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HookInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
}

impl HookInput {
    /// Shell command of a `Bash` tool invocation.
    pub fn shell_command(&self) -> Option<&str> {
        if self.tool_name.as_deref() != Some("Bash") {
            return None;
        }
        self.tool_input
            .as_ref()
            .and_then(|input| input.get("command"))
            .and_then(Value::as_str)
    }
}
