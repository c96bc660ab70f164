use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use super::{RuntimeInfo, RuntimeKind, RuntimeSource, SocketProbe, UnixSocketProbe};
use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;

const MAX_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone)]
struct CachedRuntime {
    checked_at: DateTime<Utc>,
    info: Arc<RuntimeInfo>,
}

/// TTL-cached runtime detection.
///
/// Readers within the TTL share one `Arc<RuntimeInfo>`. A refresh probes
/// without holding the lock and then swaps the cached value, so concurrent
/// readers never wait on a socket.
pub struct RuntimeResolver<P: SocketProbe = UnixSocketProbe, C: Clock = SystemClock> {
    pinned: Option<RuntimeKind>,
    candidates: Vec<(RuntimeKind, PathBuf)>,
    ttl: Duration,
    probe: P,
    clock: C,
    cache: RwLock<Option<CachedRuntime>>,
}

impl RuntimeResolver {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        Self::new(
            config,
            dirs::home_dir(),
            runtime_dir,
            UnixSocketProbe::new(std::time::Duration::from_millis(config.probe_timeout_ms)),
            SystemClock,
        )
    }
}

impl<P: SocketProbe, C: Clock> RuntimeResolver<P, C> {
    pub fn new(
        config: &RuntimeConfig,
        home: Option<PathBuf>,
        runtime_dir: Option<PathBuf>,
        probe: P,
        clock: C,
    ) -> Self {
        let pinned = (config.kind != RuntimeKind::Auto).then_some(config.kind);
        let candidates = candidate_sockets(config, home, runtime_dir);
        Self {
            pinned,
            candidates,
            ttl: Duration::seconds(config.cache_ttl_secs.min(MAX_TTL_SECS) as i64),
            probe,
            clock,
            cache: RwLock::new(None),
        }
    }

    /// Returns the cached snapshot when still fresh; `force_refresh` always re-probes.
    pub fn resolve(&self, force_refresh: bool) -> Arc<RuntimeInfo> {
        let now = self.clock.now();
        if !force_refresh {
            if let Some(info) = self.cached(now) {
                return info;
            }
        }

        let info = Arc::new(self.detect());
        let entry = CachedRuntime {
            checked_at: now,
            info: Arc::clone(&info),
        };
        match self.cache.write() {
            Ok(mut guard) => *guard = Some(entry),
            Err(poisoned) => *poisoned.into_inner() = Some(entry),
        }
        info
    }

    /// When the cached snapshot was taken, if any.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.read_cache().map(|entry| entry.checked_at)
    }

    fn cached(&self, now: DateTime<Utc>) -> Option<Arc<RuntimeInfo>> {
        let entry = self.read_cache()?;
        let age = now.signed_duration_since(entry.checked_at);
        if age >= Duration::zero() && age < self.ttl {
            Some(entry.info)
        } else {
            None
        }
    }

    fn read_cache(&self) -> Option<CachedRuntime> {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn detect(&self) -> RuntimeInfo {
        let responding = self
            .candidates
            .iter()
            .find(|(_, socket)| self.probe.ping(socket));

        match (self.pinned, responding) {
            (Some(kind), found) => {
                let socket_path = found
                    .map(|(_, socket)| socket.clone())
                    .or_else(|| self.candidates.first().map(|(_, socket)| socket.clone()));
                let running = found.is_some();
                info!(
                    runtime = kind.as_str(),
                    running,
                    socket = ?socket_path,
                    "Using configured container runtime"
                );
                RuntimeInfo {
                    kind,
                    socket_path,
                    available: true,
                    running,
                    source: RuntimeSource::Configured,
                }
            }
            (None, Some((kind, socket))) => {
                info!(runtime = kind.as_str(), socket = %socket.display(), "Detected container runtime");
                RuntimeInfo {
                    kind: *kind,
                    socket_path: Some(socket.clone()),
                    available: true,
                    running: true,
                    source: RuntimeSource::Detected,
                }
            }
            (None, None) => {
                debug!(
                    candidates = self.candidates.len(),
                    "No container runtime responded"
                );
                RuntimeInfo::unavailable()
            }
        }
    }
}

fn candidate_sockets(
    config: &RuntimeConfig,
    home: Option<PathBuf>,
    runtime_dir: Option<PathBuf>,
) -> Vec<(RuntimeKind, PathBuf)> {
    let home = home.as_deref();
    let runtime_dir = runtime_dir.as_deref();
    let mut candidates = Vec::new();

    if config.kind == RuntimeKind::Auto {
        if let Some(socket) = &config.socket_path {
            candidates.push((RuntimeKind::infer_from_socket(socket), socket.clone()));
        }
        for kind in RuntimeKind::PRIORITY {
            for socket in kind.default_sockets(home, runtime_dir) {
                candidates.push((kind, socket));
            }
        }
    } else {
        if let Some(socket) = &config.socket_path {
            candidates.push((config.kind, socket.clone()));
        }
        for socket in config.kind.default_sockets(home, runtime_dir) {
            candidates.push((config.kind, socket));
        }
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|(_, socket)| seen.insert(socket.clone()));
    candidates
}
