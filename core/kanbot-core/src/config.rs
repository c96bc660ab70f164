//! Read-only settings for the orchestration core.
//!
//! Settings come from `~/.kanbot/config.toml` (or `KANBOT_CONFIG`). Every
//! section has defaults, so a missing file or a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::error::{KanbotError, Result};
use crate::runtime::RuntimeKind;
use crate::storage::StorageConfig;

pub const CONFIG_ENV: &str = "KANBOT_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct KanbotConfig {
    pub runtime: RuntimeConfig,
    pub launch: LaunchConfig,
    pub containers: ContainerConfig,
    pub review_gate: ReviewGateConfig,
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// `auto` probes the priority list; anything else pins that runtime.
    pub kind: RuntimeKind,
    /// Socket probed before the defaults (or instead of them when pinned).
    pub socket_path: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub probe_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kind: RuntimeKind::Auto,
            socket_path: None,
            cache_ttl_secs: 60,
            probe_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LaunchConfig {
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub image_tag: String,
    pub timeout_seconds: u64,
    pub max_iterations: u32,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            agent_command: "claude".to_string(),
            agent_args: Vec::new(),
            image_tag: "kanbot-sandbox:latest".to_string(),
            timeout_seconds: 3600,
            max_iterations: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ContainerConfig {
    /// Docker-compatible CLI used to talk to the runtime socket.
    pub cli: String,
    pub log_tail_lines: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            cli: "docker".to_string(),
            log_tail_lines: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReviewGateConfig {
    pub enabled: bool,
    /// Relative paths resolve against the worktree root.
    pub marker_path: PathBuf,
    pub source_extensions: Vec<String>,
    pub excluded_dirs: Vec<String>,
}

impl Default for ReviewGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            marker_path: PathBuf::from(".kanbot/review-complete"),
            source_extensions: [
                "ts", "tsx", "js", "jsx", "mjs", "cjs", "vue", "svelte", "rs", "py", "go", "java",
                "kt", "swift", "rb", "css", "scss",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            excluded_dirs: [
                "node_modules",
                "dist",
                "build",
                "target",
                ".next",
                "coverage",
                "vendor",
                "generated",
                "__generated__",
            ]
            .iter()
            .map(|dir| dir.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServicesConfig {
    pub manifest_path: PathBuf,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(".kanbot/services.json"),
        }
    }
}

/// Loads the config file. Missing file yields defaults; malformed file is an error.
pub fn load_config(path: Option<PathBuf>) -> Result<KanbotConfig> {
    let config_path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !config_path.exists() {
        return Ok(KanbotConfig::default());
    }

    let content = fs_err::read_to_string(&config_path)
        .map_err(KanbotError::io(format!("reading {}", config_path.display())))?;
    toml::from_str::<KanbotConfig>(&content).map_err(|err| KanbotError::ConfigMalformed {
        path: config_path,
        details: err.to_string(),
    })
}

/// Loads the config, falling back to defaults with a warning on any failure.
pub fn load_config_or_default(path: Option<PathBuf>) -> KanbotConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load Kanbot config; using defaults");
            KanbotConfig::default()
        }
    }
}

fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(StorageConfig::resolve()?.config_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_defaults_when_file_missing() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config =
            load_config(Some(temp_dir.path().join("missing.toml"))).expect("load config");
        assert_eq!(config, KanbotConfig::default());
        assert_eq!(config.runtime.cache_ttl_secs, 60);
    }

    #[test]
    fn load_config_parses_partial_sections() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(
            &path,
            r#"
[runtime]
kind = "colima"
socket_path = "/Users/dev/.colima/work/docker.sock"

[launch]
max_iterations = 7
agent_args = ["--dangerously-skip-permissions"]

[review_gate]
excluded_dirs = ["node_modules"]
"#,
        )
        .expect("write config");

        let config = load_config(Some(path)).expect("load config");
        assert_eq!(config.runtime.kind, RuntimeKind::Colima);
        assert_eq!(
            config.runtime.socket_path,
            Some(PathBuf::from("/Users/dev/.colima/work/docker.sock"))
        );
        assert_eq!(config.runtime.cache_ttl_secs, 60);
        assert_eq!(config.launch.max_iterations, 7);
        assert_eq!(config.launch.timeout_seconds, 3600);
        assert_eq!(config.launch.agent_args, vec!["--dangerously-skip-permissions"]);
        assert_eq!(config.review_gate.excluded_dirs, vec!["node_modules"]);
        assert!(config.review_gate.enabled);
    }

    #[test]
    fn load_config_rejects_malformed_toml() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "[runtime\nkind = ").expect("write config");

        let err = load_config(Some(path)).unwrap_err();
        assert!(matches!(err, KanbotError::ConfigMalformed { .. }));
    }

    #[test]
    fn load_config_or_default_swallows_errors() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("config.toml");
        fs_err::write(&path, "runtime = 5").expect("write config");

        assert_eq!(load_config_or_default(Some(path)), KanbotConfig::default());
    }
}
