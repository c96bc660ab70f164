//! Session event log and state reconstruction.
//!
//! `EventLog::append` is the only mutation. Everything else replays the log
//! through the pure reducer in [`reducer`]. Cancelling a session means
//! appending an `end` event.

mod db;
mod reducer;

pub use db::EventLog;
pub use reducer::{fold_events, FoldSummary, SessionState, StoredEvent, TicketSessionRecord};

use once_cell::sync::Lazy;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

static SEQUENCE: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

/// Fresh `sequence_id` for a single-authority writer.
///
/// Ids from one process sort in call order, even within the same millisecond.
pub fn new_sequence_id() -> String {
    let generated = SEQUENCE
        .lock()
        .ok()
        .and_then(|mut generator| generator.generate().ok());
    generated.unwrap_or_else(Ulid::new).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ids_sort_in_call_order() {
        let ids: Vec<String> = (0..200).map(|_| new_sequence_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids[0].len(), 26);
    }
}
