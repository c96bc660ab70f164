//! Error types for kanbot-core operations.
//!
//! Most read paths never return these: they absorb failures into typed
//! `{ available: false, error }` results. Only the event log and the config
//! loader propagate errors to the caller.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum KanbotError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // Event Log Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Event log error: {context}: {source}")]
    Database {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid session event: {0}")]
    InvalidEvent(kanbot_protocol::ErrorInfo),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, KanbotError>;

impl KanbotError {
    pub(crate) fn db(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| KanbotError::Database { context, source }
    }

    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| KanbotError::Io { context, source }
    }
}

impl From<KanbotError> for String {
    fn from(err: KanbotError) -> String {
        err.to_string()
    }
}
