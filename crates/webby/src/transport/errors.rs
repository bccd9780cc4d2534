//! Error types for control-socket operations.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced while binding or running the command listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to read metadata for unix socket {path}: {source}")]
    Metadata {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unix socket path {path} is not a socket")]
    NotSocket { path: Utf8PathBuf },
    #[error("existing unix socket {path} is already in use")]
    InUse { path: Utf8PathBuf },
    #[error("failed to connect to existing unix socket {path}: {source}")]
    Connect {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale unix socket {path}: {source}")]
    Cleanup {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind unix listener at {path}: {source}")]
    Bind {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("failed to accept control connection: {source}")]
    Accept {
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn listener thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ThreadPanic,
}

impl ListenerError {
    /// Returns `true` when another process is already serving the socket.
    #[must_use]
    pub const fn is_in_use(&self) -> bool {
        matches!(self, Self::InUse { .. })
    }
}
