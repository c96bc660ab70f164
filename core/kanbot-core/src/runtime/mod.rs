//! Container runtime detection.
//!
//! A runtime is any Docker-compatible engine reachable over a unix socket.
//! Several desktop distributions put that socket in different places, so
//! detection walks a fixed priority list and keeps the first socket that
//! answers a liveness probe.

mod probe;
mod resolver;

pub use probe::{SocketProbe, UnixSocketProbe};
pub use resolver::RuntimeResolver;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    #[default]
    Auto,
    Docker,
    Orbstack,
    Colima,
    RancherDesktop,
    Podman,
}

impl RuntimeKind {
    /// Detection order used in `auto` mode.
    pub const PRIORITY: [RuntimeKind; 5] = [
        RuntimeKind::Docker,
        RuntimeKind::Orbstack,
        RuntimeKind::Colima,
        RuntimeKind::RancherDesktop,
        RuntimeKind::Podman,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Auto => "auto",
            RuntimeKind::Docker => "docker",
            RuntimeKind::Orbstack => "orbstack",
            RuntimeKind::Colima => "colima",
            RuntimeKind::RancherDesktop => "rancher_desktop",
            RuntimeKind::Podman => "podman",
        }
    }

    /// Best guess at which runtime owns a user-supplied socket path.
    pub fn infer_from_socket(path: &Path) -> RuntimeKind {
        let text = path.to_string_lossy().to_ascii_lowercase();
        if text.contains("orbstack") {
            RuntimeKind::Orbstack
        } else if text.contains("colima") {
            RuntimeKind::Colima
        } else if text.contains("/.rd/") || text.contains("rancher") {
            RuntimeKind::RancherDesktop
        } else if text.contains("podman") {
            RuntimeKind::Podman
        } else {
            RuntimeKind::Docker
        }
    }

    /// Well-known socket locations for this runtime, most likely first.
    pub fn default_sockets(&self, home: Option<&Path>, runtime_dir: Option<&Path>) -> Vec<PathBuf> {
        let under_home = |relative: &str| home.map(|home| home.join(relative));
        match self {
            RuntimeKind::Auto => Vec::new(),
            RuntimeKind::Docker => [
                Some(PathBuf::from("/var/run/docker.sock")),
                under_home(".docker/run/docker.sock"),
                under_home(".docker/desktop/docker.sock"),
            ]
            .into_iter()
            .flatten()
            .collect(),
            RuntimeKind::Orbstack => under_home(".orbstack/run/docker.sock").into_iter().collect(),
            RuntimeKind::Colima => [
                under_home(".colima/default/docker.sock"),
                under_home(".colima/docker.sock"),
            ]
            .into_iter()
            .flatten()
            .collect(),
            RuntimeKind::RancherDesktop => under_home(".rd/docker.sock").into_iter().collect(),
            RuntimeKind::Podman => [
                runtime_dir.map(|dir| dir.join("podman/podman.sock")),
                Some(PathBuf::from("/run/podman/podman.sock")),
                under_home(".local/share/containers/podman/machine/podman.sock"),
            ]
            .into_iter()
            .flatten()
            .collect(),
        }
    }
}

/// How the runtime in a [`RuntimeInfo`] was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeSource {
    /// Found by probing the priority list.
    Detected,
    /// Pinned in configuration; `running` says whether it answered.
    Configured,
    /// Nothing answered.
    None,
}

/// Snapshot of runtime availability. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    pub kind: RuntimeKind,
    pub socket_path: Option<PathBuf>,
    pub available: bool,
    pub running: bool,
    pub source: RuntimeSource,
}

impl RuntimeInfo {
    pub fn unavailable() -> Self {
        Self {
            kind: RuntimeKind::Auto,
            socket_path: None,
            available: false,
            running: false,
            source: RuntimeSource::None,
        }
    }

    /// Configured runtimes stay unconfirmed until their socket answers.
    pub fn is_confirmed(&self) -> bool {
        self.running
    }

    /// `DOCKER_HOST`-style URI for the resolved socket.
    pub fn docker_host(&self) -> Option<String> {
        self.socket_path
            .as_ref()
            .map(|path| format!("unix://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_kind_from_socket_path() {
        assert_eq!(
            RuntimeKind::infer_from_socket(Path::new("/Users/a/.orbstack/run/docker.sock")),
            RuntimeKind::Orbstack
        );
        assert_eq!(
            RuntimeKind::infer_from_socket(Path::new("/Users/a/.rd/docker.sock")),
            RuntimeKind::RancherDesktop
        );
        assert_eq!(
            RuntimeKind::infer_from_socket(Path::new("/tmp/custom.sock")),
            RuntimeKind::Docker
        );
    }

    #[test]
    fn default_sockets_respect_home_and_runtime_dir() {
        let home = Path::new("/home/dev");
        let podman = RuntimeKind::Podman.default_sockets(Some(home), Some(Path::new("/run/user/1000")));
        assert_eq!(podman[0], PathBuf::from("/run/user/1000/podman/podman.sock"));

        let colima = RuntimeKind::Colima.default_sockets(None, None);
        assert!(colima.is_empty());

        assert!(RuntimeKind::Auto.default_sockets(Some(home), None).is_empty());
    }

    #[test]
    fn docker_host_uses_unix_scheme() {
        let info = RuntimeInfo {
            kind: RuntimeKind::Colima,
            socket_path: Some(PathBuf::from("/home/dev/.colima/default/docker.sock")),
            available: true,
            running: true,
            source: RuntimeSource::Detected,
        };
        assert_eq!(
            info.docker_host().as_deref(),
            Some("unix:///home/dev/.colima/default/docker.sock")
        );
        assert_eq!(RuntimeInfo::unavailable().docker_host(), None);
    }
}
