//! Socket connectivity probe.

use std::io;
use std::time::Duration;

use camino::Utf8Path;
use socket2::{Domain, SockAddr, Socket, Type};

use super::LaunchError;

const SOCKET_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Checks whether a process is accepting connections on the control socket.
pub fn socket_is_reachable(path: &Utf8Path) -> Result<bool, LaunchError> {
    match connect_unix(path) {
        Ok(()) => Ok(true),
        Err(error) if is_socket_available(&error) => Ok(false),
        Err(source) => Err(LaunchError::Probe {
            socket: path.to_path_buf(),
            source,
        }),
    }
}

fn connect_unix(path: &Utf8Path) -> io::Result<()> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, SOCKET_PROBE_TIMEOUT)
}

/// Errors meaning nothing is listening: the socket file is missing or the
/// connection was refused. `ConnectionReset` is excluded because it implies a
/// peer accepted first.
fn is_socket_available(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotFound
            | io::ErrorKind::AddrNotAvailable
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::os::unix::net::UnixListener;

    #[test]
    fn reachability_tracks_a_bound_listener() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("webby.sock")).expect("utf8 path");
        assert!(!socket_is_reachable(&path).expect("probe missing socket"));

        let listener = UnixListener::bind(&path).expect("bind listener");
        assert!(socket_is_reachable(&path).expect("probe bound socket"));

        drop(listener);
        assert!(!socket_is_reachable(&path).expect("probe stale socket"));
    }
}
