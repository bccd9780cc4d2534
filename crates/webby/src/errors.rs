//! Top-level error surface for the `webby` binary.

use std::io;

use thiserror::Error;

use webby_config::ConfigError;

use crate::client::ClientError;
use crate::lifecycle::LifecycleError;
use crate::process::LaunchError;

/// Errors that end an invocation with a failure exit code.
#[derive(Debug, Error)]
pub enum AppError {
    /// The invocation requested nothing.
    #[error("nothing to do; pass --help to list the available commands")]
    NothingToDo,
    /// Writing the default configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Starting the detached daemon failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// The daemon exited with an error.
    #[error(transparent)]
    Daemon(#[from] LifecycleError),
    /// A control command failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Writing to the terminal failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
