use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::adapter::{CommandContainerAdapter, ContainerAdapter};
use super::parse::{parse_iteration_progress, IterationProgress};
use super::{is_session_container, ContainerDescriptor, ContainerStats};
use crate::runtime::RuntimeInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerListing {
    pub available: bool,
    pub containers: Vec<ContainerDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub available: bool,
    pub stats: Vec<ContainerStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogTail {
    pub available: bool,
    pub text: String,
    pub container_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<IterationProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatus {
    pub available: bool,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only view of session containers.
///
/// Every operation tolerates a stopped runtime (empty result, no error) and
/// absorbs runtime failures into `available: false` with the message. A failed
/// poll says nothing about the session itself.
pub struct LifecycleMonitor<A: ContainerAdapter = CommandContainerAdapter> {
    adapter: A,
}

impl<A: ContainerAdapter> LifecycleMonitor<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn list_containers(&self, runtime: &RuntimeInfo) -> ContainerListing {
        if !runtime.running {
            return ContainerListing {
                available: false,
                containers: Vec::new(),
                error: None,
            };
        }

        match self.adapter.list_containers(runtime) {
            Ok(containers) => ContainerListing {
                available: true,
                containers: containers
                    .into_iter()
                    .filter(|container| is_session_container(&container.name))
                    .collect(),
                error: None,
            },
            Err(err) => {
                warn!(error = %err, "Failed to list session containers");
                ContainerListing {
                    available: false,
                    containers: Vec::new(),
                    error: Some(err),
                }
            }
        }
    }

    /// Stats for the named containers, or for every running session container.
    pub fn stats(&self, runtime: &RuntimeInfo, names: Option<&[String]>) -> StatsReport {
        if !runtime.running {
            return StatsReport {
                available: false,
                stats: Vec::new(),
                error: None,
            };
        }

        let names: Vec<String> = match names {
            Some(names) => names
                .iter()
                .filter(|name| is_session_container(name))
                .cloned()
                .collect(),
            None => {
                let listing = self.list_containers(runtime);
                if !listing.available {
                    return StatsReport {
                        available: false,
                        stats: Vec::new(),
                        error: listing.error,
                    };
                }
                listing
                    .containers
                    .into_iter()
                    .filter(|container| container.is_running)
                    .map(|container| container.name)
                    .collect()
            }
        };

        if names.is_empty() {
            return StatsReport {
                available: true,
                stats: Vec::new(),
                error: None,
            };
        }

        match self.adapter.stats(runtime, &names) {
            Ok(stats) => StatsReport {
                available: true,
                stats: stats
                    .into_iter()
                    .filter(|entry| is_session_container(&entry.container_name))
                    .collect(),
                error: None,
            },
            Err(err) => {
                warn!(error = %err, containers = names.len(), "Failed to read container stats");
                StatsReport {
                    available: false,
                    stats: Vec::new(),
                    error: Some(err),
                }
            }
        }
    }

    pub fn logs(&self, runtime: &RuntimeInfo, name: &str, tail_lines: usize) -> LogTail {
        let unavailable = |error: Option<String>| LogTail {
            available: false,
            text: String::new(),
            container_running: false,
            progress: None,
            error,
        };

        if !runtime.running {
            return unavailable(None);
        }
        if !is_session_container(name) {
            debug!(container = %name, "Refusing to tail non-session container");
            return unavailable(Some(format!("{} is not a session container", name)));
        }

        let text = match self.adapter.logs(runtime, name, tail_lines) {
            Ok(text) => text,
            Err(err) => {
                warn!(container = %name, error = %err, "Failed to read container logs");
                return unavailable(Some(err));
            }
        };

        let container_running = match self.adapter.is_running(runtime, name) {
            Ok(running) => running,
            Err(err) => {
                debug!(container = %name, error = %err, "Failed to inspect container state");
                false
            }
        };

        LogTail {
            available: true,
            progress: parse_iteration_progress(&text),
            text,
            container_running,
            error: None,
        }
    }

    /// Whether the sandbox image exists locally.
    pub fn image_ready(&self, runtime: &RuntimeInfo, tag: &str) -> ImageStatus {
        if !runtime.running {
            return ImageStatus {
                available: false,
                ready: false,
                error: None,
            };
        }

        match self.adapter.image_exists(runtime, tag) {
            Ok(ready) => ImageStatus {
                available: true,
                ready,
                error: None,
            },
            Err(err) => {
                warn!(image = %tag, error = %err, "Failed to inspect sandbox image");
                ImageStatus {
                    available: false,
                    ready: false,
                    error: Some(err),
                }
            }
        }
    }
}
