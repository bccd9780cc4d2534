use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use webby_protocol::Command;

/// Errors raised by the control client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing answered on the control socket.
    #[error("could not open control socket {socket}: {source}")]
    Unreachable {
        socket: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// A command could not be exchanged with the daemon.
    #[error("failed to exchange '{command}' with the daemon: {source}")]
    Exchange {
        command: Command,
        #[source]
        source: io::Error,
    },
    /// The daemon log could not be read.
    #[error("could not read server log file {path}: {source}")]
    ReadLog {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// No log file is configured.
    #[error("no log file is configured")]
    NoLogFile,
    /// Writing to the terminal failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    /// One or more commands did not succeed.
    #[error("{failed} command(s) failed")]
    CommandsFailed { failed: usize },
}
