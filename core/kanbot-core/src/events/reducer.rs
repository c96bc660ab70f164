//! Pure session reducer.
//!
//! The stored history is replayed in `sequence_id` order. The first stored
//! `end` event closes the session: anything sequenced after it, or stored
//! after it, stays in the log but no longer moves the folded state.
//!
//! Sequence ids compare as plain strings. Writers must emit fixed-width ids
//! (ULIDs from [`crate::new_sequence_id`], or zero-padded counters): bare
//! numbers like `"9"` and `"10"` fold in byte order, not numeric order.

use kanbot_protocol::{EventType, SessionEvent};
use serde::{Serialize, Serializer};

/// An event as read back from the log, with its arrival position.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub arrival: i64,
    pub event: SessionEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unknown,
    Reported(String),
}

impl SessionState {
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Unknown => "unknown",
            SessionState::Reported(state) => state,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldSummary {
    pub session_id: String,
    pub ticket_id: Option<String>,
    pub state: SessionState,
    pub started: bool,
    pub ended: bool,
    pub review_iteration: u32,
    /// Events that contributed to the fold.
    pub event_count: usize,
    /// Events kept for audit but ignored because the session had ended.
    pub ignored_count: usize,
    pub last_sequence_id: Option<String>,
}

/// Replays `events` (any order) into a summary.
pub fn fold_events(session_id: &str, events: &[StoredEvent]) -> FoldSummary {
    let mut ordered: Vec<&StoredEvent> = events
        .iter()
        .filter(|stored| stored.event.session_id == session_id)
        .collect();
    ordered.sort_by(|left, right| {
        left.event
            .sequence_id
            .cmp(&right.event.sequence_id)
            .then(left.arrival.cmp(&right.arrival))
    });

    let terminal = ordered
        .iter()
        .filter(|stored| stored.event.event_type == EventType::End)
        .min_by_key(|stored| stored.arrival)
        .map(|stored| (stored.arrival, stored.event.sequence_id.clone()));

    let mut summary = FoldSummary {
        session_id: session_id.to_string(),
        ..FoldSummary::default()
    };

    for stored in ordered {
        let counts = match &terminal {
            Some((arrival, sequence_id)) => {
                stored.arrival <= *arrival && stored.event.sequence_id <= *sequence_id
            }
            None => true,
        };
        if counts {
            reduce(&mut summary, &stored.event);
        } else {
            summary.ignored_count += 1;
        }
    }

    summary
}

fn reduce(summary: &mut FoldSummary, event: &SessionEvent) {
    match event.event_type {
        EventType::Start => {
            summary.started = true;
            if summary.ticket_id.is_none() {
                summary.ticket_id = event.ticket_id().map(str::to_string);
            }
        }
        EventType::StateChange => {
            if let Some(state) = event.reported_state() {
                summary.state = SessionState::Reported(state.to_string());
            }
            if let Some(iteration) = event.review_iteration() {
                summary.review_iteration = summary.review_iteration.max(iteration);
            }
        }
        EventType::ToolCall | EventType::ToolResult | EventType::Prompt => {}
        EventType::End => summary.ended = true,
    }
    summary.event_count += 1;
    summary.last_sequence_id = Some(event.sequence_id.clone());
}

/// Every session observed for one ticket, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSessionRecord {
    pub ticket_id: String,
    pub sessions: Vec<FoldSummary>,
}

impl TicketSessionRecord {
    /// True once any session for the ticket has emitted `start`.
    pub fn session_observed(&self) -> bool {
        self.sessions.iter().any(|session| session.started)
    }

    /// Highest review round reported by any session; never decreases.
    pub fn review_iteration(&self) -> u32 {
        self.sessions
            .iter()
            .map(|session| session.review_iteration)
            .max()
            .unwrap_or(0)
    }

    pub fn latest(&self) -> Option<&FoldSummary> {
        self.sessions.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(arrival: i64, sequence_id: &str, event_type: EventType, payload: serde_json::Value) -> StoredEvent {
        StoredEvent {
            arrival,
            event: SessionEvent {
                session_id: "s-1".to_string(),
                sequence_id: sequence_id.to_string(),
                event_type,
                payload,
                created_at: "2026-03-01T09:00:00Z".to_string(),
            },
        }
    }

    fn state(arrival: i64, sequence_id: &str, value: &str) -> StoredEvent {
        stored(arrival, sequence_id, EventType::StateChange, json!({ "state": value }))
    }

    #[test]
    fn empty_history_is_unknown() {
        let summary = fold_events("s-1", &[]);
        assert_eq!(summary.state, SessionState::Unknown);
        assert!(!summary.started);
        assert_eq!(summary.last_sequence_id, None);
    }

    #[test]
    fn out_of_order_arrival_folds_by_sequence() {
        let events = vec![
            state(1, "0003", "reviewing"),
            stored(2, "0001", EventType::Start, json!({ "ticket_id": "TCK-1" })),
            state(3, "0002", "implementing"),
        ];
        let summary = fold_events("s-1", &events);
        assert_eq!(summary.state.as_str(), "reviewing");
        assert_eq!(summary.ticket_id.as_deref(), Some("TCK-1"));
        assert_eq!(summary.last_sequence_id.as_deref(), Some("0003"));
    }

    #[test]
    fn sequence_ids_order_lexicographically() {
        let padded = vec![
            state(1, "0010", "reviewing"),
            state(2, "0009", "implementing"),
        ];
        assert_eq!(fold_events("s-1", &padded).state.as_str(), "reviewing");

        // Unpadded counters sort "10" before "9".
        let unpadded = vec![
            state(1, "10", "reviewing"),
            state(2, "9", "implementing"),
        ];
        let summary = fold_events("s-1", &unpadded);
        assert_eq!(summary.state.as_str(), "implementing");
        assert_eq!(summary.last_sequence_id.as_deref(), Some("9"));
    }

    #[test]
    fn events_sequenced_after_end_are_ignored() {
        let events = vec![
            state(1, "0001", "implementing"),
            stored(2, "0002", EventType::End, json!({})),
            state(3, "0003", "zombie"),
        ];
        let summary = fold_events("s-1", &events);
        assert_eq!(summary.state.as_str(), "implementing");
        assert!(summary.ended);
        assert_eq!(summary.ignored_count, 1);
    }

    #[test]
    fn late_arrivals_after_end_do_not_change_fold() {
        let before = vec![
            state(1, "0001", "implementing"),
            stored(2, "0005", EventType::End, json!({})),
        ];
        let mut after = before.clone();
        after.push(state(3, "0003", "late"));

        assert_eq!(
            fold_events("s-1", &before).state,
            fold_events("s-1", &after).state
        );
    }

    #[test]
    fn review_iteration_never_decreases() {
        let events = vec![
            stored(1, "0001", EventType::StateChange, json!({ "state": "ai_review", "review_iteration": 3 })),
            stored(2, "0002", EventType::StateChange, json!({ "state": "fixing", "review_iteration": 1 })),
        ];
        assert_eq!(fold_events("s-1", &events).review_iteration, 3);
    }

    #[test]
    fn fold_is_idempotent() {
        let events = vec![
            stored(1, "0001", EventType::Start, json!({})),
            state(2, "0002", "implementing"),
            stored(3, "0003", EventType::ToolCall, json!({ "tool": "Bash" })),
        ];
        assert_eq!(fold_events("s-1", &events), fold_events("s-1", &events));
    }

    #[test]
    fn state_serializes_as_plain_string() {
        assert_eq!(serde_json::to_value(SessionState::Unknown).unwrap(), json!("unknown"));
        assert_eq!(
            serde_json::to_value(SessionState::Reported("done".to_string())).unwrap(),
            json!("done")
        );
    }

    #[test]
    fn ticket_record_aggregates_sessions() {
        let record = TicketSessionRecord {
            ticket_id: "TCK-1".to_string(),
            sessions: vec![
                FoldSummary {
                    started: true,
                    review_iteration: 2,
                    ..FoldSummary::default()
                },
                FoldSummary {
                    review_iteration: 1,
                    ..FoldSummary::default()
                },
            ],
        };
        assert!(record.session_observed());
        assert_eq!(record.review_iteration(), 2);
        assert_eq!(TicketSessionRecord::default().review_iteration(), 0);
    }
}
