use std::io;
use std::net::SocketAddr;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while building or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The content root could not be inspected.
    #[error("could not stat site root '{path}': {source}")]
    SiteRoot {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The content root exists but is not a directory.
    #[error("site root '{path}' is not a directory")]
    NotDirectory { path: Utf8PathBuf },
    /// A configured TLS file could not be inspected.
    #[error("could not stat TLS file '{path}': {source}")]
    Tls {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The certificate or key could not be loaded for serving HTTPS.
    #[error("could not load TLS certificate '{cert}' with key '{key}': {source}")]
    TlsConfig {
        cert: Utf8PathBuf,
        key: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The async runtime could not be created.
    #[error("failed to build HTTP runtime: {source}")]
    Runtime {
        #[source]
        source: io::Error,
    },
    /// An HTTP or HTTPS port could not be bound.
    #[error("failed to bind listener at {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The server thread could not be spawned.
    #[error("failed to spawn HTTP server thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    /// The server thread panicked.
    #[error("HTTP server thread panicked")]
    ThreadPanic,
}
