use camino::Utf8PathBuf;
use thiserror::Error;

use crate::process::ShutdownError;
use crate::server::ServerError;
use crate::telemetry::TelemetryError;

/// Errors that end the daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The HTTP server could not be built or started.
    #[error("HTTP server failed to start: {0}")]
    Server(#[from] ServerError),
    /// Termination signal handlers could not be installed.
    #[error(transparent)]
    Signals(#[from] ShutdownError),
    /// Another daemon owns the control socket.
    #[error("another webby daemon is listening on {socket}")]
    AlreadyRunning { socket: Utf8PathBuf },
}
