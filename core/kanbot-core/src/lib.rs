//! # kanbot-core
//!
//! Orchestration core for Kanbot agent sessions: which container runtime to
//! use, how to launch a session, what its container is doing, what state its
//! event log folds to, which workflow phase its ticket is in, and whether a
//! publish may go through.
//!
//! ## Design Principles
//!
//! - **Synchronous**: no async runtime. Callers own polling and cadence.
//! - **Graceful degradation**: a stopped runtime, a missing manifest or a
//!   broken diff yields an empty or "unavailable" result, never a panic.
//! - **Append-only history**: session state is always re-derived from the
//!   event log; nothing else is written.
//! - **Read-only towards containers**: no operation stops or removes one.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kanbot_core::{load_config_or_default, RuntimeResolver, StorageConfig};
//!
//! let storage = StorageConfig::resolve()?;
//! let config = load_config_or_default(Some(storage.config_file()));
//! let runtime = RuntimeResolver::from_config(&config.runtime).resolve(false);
//! ```

pub mod clock;
pub mod config;
pub mod containers;
pub mod error;
pub mod events;
pub mod launch;
pub mod patterns;
pub mod review_gate;
pub mod runtime;
pub mod services;
pub mod sessions;
pub mod storage;
pub mod workflow;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, load_config_or_default, KanbotConfig, CONFIG_ENV};
pub use containers::{
    container_name_for, CommandContainerAdapter, ContainerAdapter, ContainerDescriptor,
    ContainerStats, LifecycleMonitor,
};
pub use error::{KanbotError, Result};
pub use events::{new_sequence_id, EventLog, FoldSummary, SessionState, TicketSessionRecord};
pub use launch::{plan, LaunchMode, LaunchPlan, LaunchTarget, Platform, TargetKind};
pub use review_gate::{GateDecision, ReviewGate};
pub use runtime::{RuntimeInfo, RuntimeKind, RuntimeResolver};
pub use services::read_manifest;
pub use sessions::{session_overview, SessionOverview};
pub use storage::StorageConfig;
pub use workflow::{derive, derive_display_state, sync_workflow_state, WorkflowDisplayState, WorkflowPhase};
