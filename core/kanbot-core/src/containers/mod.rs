//! Container lifecycle monitoring.
//!
//! Session containers are discovered by name prefix and queried through a
//! Docker-compatible CLI pointed at the resolved runtime socket. All queries
//! are reads; this module never stops or removes a container.
//!
//! Polling guidance for callers: listing is cheap (seconds), stats are
//! expensive (tens of seconds), logs sit in between.

mod adapter;
mod monitor;
mod parse;

pub use adapter::{CommandContainerAdapter, ContainerAdapter};
pub use monitor::{ContainerListing, ImageStatus, LifecycleMonitor, LogTail, StatsReport};
pub use parse::{parse_byte_size, parse_iteration_progress, IterationProgress};

use serde::{Deserialize, Serialize};

/// Every session container name starts with this.
pub const CONTAINER_PREFIX: &str = "kanbot-session-";

const SESSION_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDescriptor {
    pub name: String,
    pub is_running: bool,
    /// Raw runtime state (`running`, `exited`, `created`, ...).
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub container_name: String,
    pub cpu_percent: f64,
    pub mem_usage_bytes: u64,
    pub mem_limit_bytes: u64,
}

pub fn is_session_container(name: &str) -> bool {
    name.starts_with(CONTAINER_PREFIX)
}

/// Container name for a session: prefix, ticket slug, short session suffix.
pub fn container_name_for(ticket_id: &str, session_id: &str) -> String {
    let ticket = slugify(ticket_id);
    let session: String = slugify(session_id)
        .chars()
        .rev()
        .take(SESSION_SUFFIX_LEN)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    match (ticket.is_empty(), session.is_empty()) {
        (false, false) => format!("{}{}-{}", CONTAINER_PREFIX, ticket, session),
        (false, true) => format!("{}{}", CONTAINER_PREFIX, ticket),
        (true, false) => format!("{}{}", CONTAINER_PREFIX, session),
        (true, true) => format!("{}unnamed", CONTAINER_PREFIX),
    }
}

/// Lowercase `[a-z0-9-]` with runs of other characters collapsed to one dash.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_names_follow_convention() {
        let name = container_name_for("TCK-17", "01HZX3J6Q8B2V4R7N0M5K1P9DA");
        assert_eq!(name, "kanbot-session-tck-17-m5k1p9da");
        assert!(is_session_container(&name));
    }

    #[test]
    fn hostile_ticket_ids_are_slugged() {
        let name = container_name_for("$(rm -rf /); `x`", "s");
        assert_eq!(name, "kanbot-session-rm-rf-x-s");
    }

    #[test]
    fn empty_inputs_still_produce_session_name() {
        assert_eq!(container_name_for("", ""), "kanbot-session-unnamed");
        assert_eq!(container_name_for("!!", "abc"), "kanbot-session-abc");
    }

    #[test]
    fn unrelated_containers_are_not_session_containers() {
        assert!(!is_session_container("postgres"));
        assert!(!is_session_container("my-kanbot-session-1"));
    }
}
