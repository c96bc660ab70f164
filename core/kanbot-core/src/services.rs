//! Service manifest reader.
//!
//! A sandboxed session writes `<worktree>/.kanbot/services.json` describing the
//! dev servers it started. The file may be missing, half-written or produced
//! by an older harness; every such case reads as an empty manifest.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kanbot_protocol::{ServiceDescriptor, ServiceManifest};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServicesConfig;
use crate::storage::StorageConfig;

pub fn manifest_path(worktree: &Path, config: &ServicesConfig) -> PathBuf {
    StorageConfig::worktree_file(worktree, &config.manifest_path)
}

pub fn read_manifest(path: &Path, now: DateTime<Utc>) -> ServiceManifest {
    let contents = match fs_err::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No service manifest");
            return ServiceManifest::empty(now);
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read service manifest");
            return ServiceManifest::empty(now);
        }
    };

    let root: Value = match serde_json::from_str(&contents) {
        Ok(root) => root,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Service manifest is not valid JSON");
            return ServiceManifest::empty(now);
        }
    };

    let Some(entries) = root.get("services").and_then(Value::as_array) else {
        warn!(path = %path.display(), "Service manifest has no services array");
        return ServiceManifest::empty(now);
    };

    let services = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_json::from_value::<ServiceDescriptor>(entry.clone()) {
                Ok(service) => {
                    if !service.port_in_range() {
                        warn!(
                            service = %service.name,
                            port = service.port,
                            kind = ?service.service_type,
                            "Service port outside its conventional range"
                        );
                    }
                    Some(service)
                }
                Err(err) => {
                    warn!(path = %path.display(), index, error = %err, "Skipping malformed service entry");
                    None
                }
            }
        })
        .collect();

    let updated_at = root
        .get("updatedAt")
        .and_then(Value::as_str)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or(now);

    ServiceManifest {
        services,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanbot_protocol::{ServiceStatus, ServiceType};
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let manifest = read_manifest(&dir.path().join("services.json"), now());
        assert!(manifest.services.is_empty());
        assert_eq!(manifest.updated_at, now());
    }

    #[test]
    fn non_array_services_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, r#"{ "services": "not-an-array" }"#).unwrap();
        assert_eq!(read_manifest(&path, now()), ServiceManifest::empty(now()));
    }

    #[test]
    fn truncated_json_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(&path, r#"{ "services": [ { "name": "web""#).unwrap();
        assert!(read_manifest(&path, now()).services.is_empty());
    }

    #[test]
    fn round_trips_three_services() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("services.json");
        let written = ServiceManifest {
            services: vec![
                ServiceDescriptor {
                    name: "web".to_string(),
                    service_type: ServiceType::Frontend,
                    port: 3000,
                    status: ServiceStatus::Running,
                    health_endpoint: Some("/health".to_string()),
                    started_at: Some(now()),
                },
                ServiceDescriptor {
                    name: "api".to_string(),
                    service_type: ServiceType::Backend,
                    port: 8080,
                    status: ServiceStatus::Starting,
                    health_endpoint: None,
                    started_at: None,
                },
                ServiceDescriptor {
                    name: "postgres".to_string(),
                    service_type: ServiceType::Database,
                    port: 5432,
                    status: ServiceStatus::Stopped,
                    health_endpoint: None,
                    started_at: Some(now()),
                },
            ],
            updated_at: now(),
        };
        std::fs::write(&path, serde_json::to_string_pretty(&written).unwrap()).unwrap();

        let later = now() + chrono::Duration::hours(1);
        assert_eq!(read_manifest(&path, later), written);
    }

    #[test]
    fn bad_entries_are_skipped_and_odd_ports_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("services.json");
        std::fs::write(
            &path,
            r#"{
                "services": [
                    { "name": "docs", "type": "docs", "port": 9999, "status": "running" },
                    { "name": "broken", "type": "spaceship", "port": 1, "status": "running" }
                ]
            }"#,
        )
        .unwrap();

        let manifest = read_manifest(&path, now());
        assert_eq!(manifest.services.len(), 1);
        assert_eq!(manifest.services[0].port, 9999);
        assert_eq!(manifest.updated_at, now());
    }

    #[test]
    fn relative_manifest_path_resolves_in_worktree() {
        let path = manifest_path(Path::new("/wt"), &ServicesConfig::default());
        assert_eq!(path, PathBuf::from("/wt/.kanbot/services.json"));
    }
}
