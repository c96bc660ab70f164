//! Storage paths for Kanbot data.
//!
//! Every path the core reads or writes is derived here so tests can point the
//! whole crate at a temp directory with [`StorageConfig::with_root`].
//!
//! Per-worktree files (review marker, service manifest) live under
//! `<worktree>/.kanbot/` because the sandboxed session writes them from inside
//! its mounted workspace.

use std::path::{Path, PathBuf};

use crate::error::{KanbotError, Result};

/// Central configuration for all Kanbot storage paths.
///
/// Production code uses [`StorageConfig::resolve`] which points to `~/.kanbot/`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir().ok_or(KanbotError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".kanbot"),
        })
    }

    /// Creates a StorageConfig with a custom root directory (tests).
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Global Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to config.toml (read-only settings).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to the SQLite event log.
    pub fn events_db(&self) -> PathBuf {
        self.root.join("events").join("events.db")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Per-Worktree Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// Resolves a configured worktree-relative path; absolute paths pass through.
    pub fn worktree_file(worktree: &Path, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            worktree.join(configured)
        }
    }
}
