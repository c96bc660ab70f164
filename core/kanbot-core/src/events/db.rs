//! SQLite-backed append-only event log.
//!
//! Writers may be several processes at once (one per running session); WAL
//! mode plus a busy timeout keeps appends from tripping over each other, and
//! `(session_id, sequence_id)` uniqueness makes retried appends no-ops.

use std::path::{Path, PathBuf};

use kanbot_protocol::{EventType, SessionEvent};
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;

use super::reducer::{fold_events, FoldSummary, SessionState, StoredEvent, TicketSessionRecord};
use crate::error::{KanbotError, Result};

pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let log = Self { path: path.into() };
        log.init_schema()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event. Returns `false` when the event was already stored.
    pub fn append(&self, event: &SessionEvent) -> Result<bool> {
        event.validate().map_err(KanbotError::InvalidEvent)?;

        let payload = serde_json::to_string(&event.payload).map_err(|source| KanbotError::Json {
            context: "Failed to serialize event payload".to_string(),
            source,
        })?;
        let ticket_id = match event.event_type {
            EventType::Start => event.ticket_id(),
            _ => None,
        };

        let inserted = self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO events (session_id, sequence_id, event_type, ticket_id, payload, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(session_id, sequence_id) DO NOTHING",
                params![
                    event.session_id,
                    event.sequence_id,
                    event.event_type.as_str(),
                    ticket_id,
                    payload,
                    event.created_at
                ],
            )
            .map_err(KanbotError::db("Failed to insert event"))
        })?;

        if inserted == 0 {
            debug!(
                session_id = %event.session_id,
                sequence_id = %event.sequence_id,
                "Duplicate event ignored"
            );
        }
        Ok(inserted > 0)
    }

    /// Full history of a session, ordered by `sequence_id`.
    pub fn events_for_session(&self, session_id: &str) -> Result<Vec<StoredEvent>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT arrival, sequence_id, event_type, payload, created_at FROM events \
                     WHERE session_id = ?1 ORDER BY sequence_id ASC, arrival ASC",
                )
                .map_err(KanbotError::db("Failed to prepare events query"))?;

            let rows = stmt
                .query_map(params![session_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(KanbotError::db("Failed to read event rows"))?;

            let mut events = Vec::new();
            for row in rows {
                let (arrival, sequence_id, event_type, payload, created_at) =
                    row.map_err(KanbotError::db("Failed to decode event row"))?;
                let Some(event_type) = EventType::parse(&event_type) else {
                    debug!(%session_id, %sequence_id, %event_type, "Skipping event with unknown type");
                    continue;
                };
                let payload = serde_json::from_str(&payload).unwrap_or_else(|err| {
                    debug!(%session_id, %sequence_id, error = %err, "Unreadable payload, using null");
                    serde_json::Value::Null
                });
                events.push(StoredEvent {
                    arrival,
                    event: SessionEvent {
                        session_id: session_id.to_string(),
                        sequence_id,
                        event_type,
                        payload,
                        created_at,
                    },
                });
            }
            Ok(events)
        })
    }

    /// Sessions whose `start` named this ticket, oldest first.
    pub fn sessions_for_ticket(&self, ticket_id: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id FROM events WHERE ticket_id = ?1 \
                     GROUP BY session_id ORDER BY MIN(arrival) ASC",
                )
                .map_err(KanbotError::db("Failed to prepare ticket sessions query"))?;
            let rows = stmt
                .query_map(params![ticket_id], |row| row.get::<_, String>(0))
                .map_err(KanbotError::db("Failed to read ticket sessions"))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(KanbotError::db("Failed to decode ticket session row"))
        })
    }

    pub fn fold(&self, session_id: &str) -> Result<SessionState> {
        Ok(self.fold_summary(session_id)?.state)
    }

    pub fn fold_summary(&self, session_id: &str) -> Result<FoldSummary> {
        let events = self.events_for_session(session_id)?;
        Ok(fold_events(session_id, &events))
    }

    pub fn ticket_session_record(&self, ticket_id: &str) -> Result<TicketSessionRecord> {
        let sessions = self
            .sessions_for_ticket(ticket_id)?
            .iter()
            .map(|session_id| self.fold_summary(session_id))
            .collect::<Result<Vec<_>>>()?;
        Ok(TicketSessionRecord {
            ticket_id: ticket_id.to_string(),
            sessions,
        })
    }

    fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS events (
                    arrival INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    sequence_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    ticket_id TEXT,
                    payload TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE(session_id, sequence_id)
                 );
                 CREATE INDEX IF NOT EXISTS events_ticket ON events(ticket_id);
                 COMMIT;",
            )
            .map_err(KanbotError::db("Failed to initialize schema"))
        })
    }

    fn with_connection<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.open()?;
        op(&conn)
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent).map_err(KanbotError::io("Failed to create event log dir"))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(KanbotError::db("Failed to open event log"))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(KanbotError::db("Failed to enable WAL"))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(KanbotError::db("Failed to set synchronous"))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(KanbotError::db("Failed to set busy_timeout"))?;

        Ok(conn)
    }
}
