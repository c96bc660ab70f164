use std::path::Path;
use std::time::Duration;

/// Lightweight liveness check against a runtime socket.
pub trait SocketProbe: Send + Sync {
    fn ping(&self, socket: &Path) -> bool;
}

/// Sends `GET /_ping` over the unix socket and expects an HTTP 200.
#[derive(Debug, Clone)]
pub struct UnixSocketProbe {
    timeout: Duration,
}

impl UnixSocketProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for UnixSocketProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl SocketProbe for UnixSocketProbe {
    #[cfg(unix)]
    fn ping(&self, socket: &Path) -> bool {
        use std::io::{Read, Write};
        use std::os::unix::net::UnixStream;

        if !socket.exists() {
            return false;
        }

        let mut stream = match UnixStream::connect(socket) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::debug!(socket = %socket.display(), error = %err, "Runtime socket refused connection");
                return false;
            }
        };
        let _ = stream.set_read_timeout(Some(self.timeout));
        let _ = stream.set_write_timeout(Some(self.timeout));

        if stream
            .write_all(b"GET /_ping HTTP/1.0\r\nHost: localhost\r\n\r\n")
            .is_err()
        {
            return false;
        }

        let mut buffer = [0u8; 64];
        match stream.read(&mut buffer) {
            Ok(read) if read > 0 => is_ok_status_line(&buffer[..read]),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    fn ping(&self, _socket: &Path) -> bool {
        false
    }
}

fn is_ok_status_line(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(bytes);
    let status_line = head.lines().next().unwrap_or_default();
    status_line.starts_with("HTTP/1.") && status_line.split_whitespace().nth(1) == Some("200")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_line() {
        assert!(is_ok_status_line(b"HTTP/1.1 200 OK\r\nApi-Version: 1.45"));
        assert!(!is_ok_status_line(b"HTTP/1.1 500 Internal Server Error"));
        assert!(!is_ok_status_line(b"garbage"));
    }

    #[test]
    fn missing_socket_is_not_alive() {
        let probe = UnixSocketProbe::default();
        assert!(!probe.ping(Path::new("/definitely/not/a/runtime.sock")));
    }

    #[cfg(unix)]
    #[test]
    fn answers_ping_from_fake_daemon() {
        use std::io::{Read, Write};
        use std::os::unix::net::UnixListener;

        let temp_dir = tempfile::tempdir().expect("temp dir");
        let socket = temp_dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).expect("bind");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = [0u8; 128];
            let _ = stream.read(&mut request);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nOK")
                .expect("write");
        });

        assert!(UnixSocketProbe::default().ping(&socket));
        server.join().expect("server thread");
    }
}
