//! Errors surfaced while launching the daemon.

use std::ffi::OsString;
use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced while starting the detached daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// A daemon already answers on the control socket.
    #[error("webby is already running on {socket}")]
    AlreadyRunning {
        /// Control socket path.
        socket: Utf8PathBuf,
    },
    /// The running executable could not be located.
    #[error("failed to locate the webby executable: {source}")]
    CurrentExe {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The daemon process could not be spawned.
    #[error("failed to launch daemon binary {binary:?}: {source}")]
    Spawn {
        /// Binary that failed to start.
        binary: OsString,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Probing the control socket failed for a reason other than absence.
    #[error("failed to probe control socket {socket}: {source}")]
    Probe {
        /// Control socket path.
        socket: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The daemon never opened its control socket.
    #[error("daemon did not open {socket} after {attempts} checks")]
    StartupTimeout {
        /// Control socket path.
        socket: Utf8PathBuf,
        /// Number of probes made.
        attempts: u32,
    },
}
