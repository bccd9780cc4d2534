//! The daemon's lifecycle loop.
//!
//! The loop loads options, brings up the HTTP server, the command listener
//! and the watchers, then blocks on a signal channel. A reload tears
//! everything down and loads again; a stop or termination signal tears
//! everything down and returns.

mod daemon;
mod errors;
mod signal;
mod state;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{error, info, warn};

use webby_config::{ConfigError, LogFormat, LogLevel, ServerOptions, load_options};

use crate::logging::LogSink;
use crate::process::{SystemTerminationSignals, TerminationSignals};
use crate::telemetry;
use crate::watcher::DEFAULT_POLL_INTERVAL;

use self::daemon::Daemon;

pub use self::errors::LifecycleError;
pub use self::signal::LifecycleSignal;
pub use self::state::Phase;

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Loads the daemon's options.
pub trait OptionsLoader: Send + Sync {
    /// Returns the options to run with, plus a diagnostic when the defaults
    /// were substituted.
    fn load(&self) -> (ServerOptions, Option<ConfigError>);
}

/// Reads options from a JSON file on every load.
#[derive(Debug, Clone)]
pub struct FileOptionsLoader {
    path: Utf8PathBuf,
}

impl FileOptionsLoader {
    /// Loads from `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OptionsLoader for FileOptionsLoader {
    fn load(&self) -> (ServerOptions, Option<ConfigError>) {
        load_options(&self.path)
    }
}

/// Paths and timings that stay fixed across reloads.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    /// Options file, also watched for changes.
    pub config_path: Utf8PathBuf,
    /// Control socket.
    pub socket_path: Utf8PathBuf,
    /// Poll interval for the watchers.
    pub watch_interval: Duration,
}

impl DaemonSettings {
    /// Settings with the default watch interval.
    #[must_use]
    pub fn new(config_path: impl Into<Utf8PathBuf>, socket_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            socket_path: socket_path.into(),
            watch_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Socket path.
    #[must_use]
    pub fn socket(&self) -> &Utf8Path {
        &self.socket_path
    }
}

/// The lifecycle loop and its collaborators.
pub struct Lifecycle<L, T> {
    settings: DaemonSettings,
    loader: L,
    termination: T,
    sink: LogSink,
}

impl<L, T> Lifecycle<L, T> {
    /// Assembles a lifecycle loop.
    pub const fn new(settings: DaemonSettings, loader: L, termination: T, sink: LogSink) -> Self {
        Self {
            settings,
            loader,
            termination,
            sink,
        }
    }

    pub(crate) const fn settings(&self) -> &DaemonSettings {
        &self.settings
    }

    pub(crate) const fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub(crate) const fn loader(&self) -> &L {
        &self.loader
    }

    pub(crate) const fn termination(&self) -> &T {
        &self.termination
    }
}

impl<L, T> Lifecycle<L, T>
where
    L: OptionsLoader,
    T: TerminationSignals,
{
    /// Runs until a stop or termination signal has been handled.
    pub fn run(&self) -> Result<(), LifecycleError> {
        let mut phase = Phase::Loading;
        let mut daemon = None;
        loop {
            phase = match phase {
                Phase::Loading => match Daemon::load(self) {
                    Ok(loaded) => {
                        daemon = Some(loaded);
                        Phase::Serving
                    }
                    Err(error) => {
                        error!(target: LIFECYCLE_TARGET, error = %error, "daemon failed to load");
                        self.close_log();
                        return Err(error);
                    }
                },
                Phase::Serving => {
                    let signal = daemon.as_ref().map_or(LifecycleSignal::Stop, Daemon::wait);
                    info!(target: LIFECYCLE_TARGET, signal = %signal, "received signal");
                    Phase::after_signal(signal)
                }
                Phase::Reloading | Phase::Stopping => {
                    if let Some(running) = daemon.take() {
                        running.teardown();
                    }
                    self.close_log();
                    match phase.after_teardown() {
                        Some(next) => next,
                        None => {
                            info!(target: LIFECYCLE_TARGET, "webby stopped");
                            return Ok(());
                        }
                    }
                }
            };
        }
    }

    fn close_log(&self) {
        info!(target: LIFECYCLE_TARGET, "closing log");
        if let Err(error) = self.sink.close() {
            warn!(target: LIFECYCLE_TARGET, error = %error, "failed to close log file");
        }
    }
}

/// Runs the daemon in the current process until it is stopped.
///
/// Installs telemetry, then drives a [`Lifecycle`] that reads options from
/// the configured file and listens for real termination signals.
pub fn run_daemon(settings: DaemonSettings, format: LogFormat) -> Result<(), LifecycleError> {
    let sink = LogSink::new(LogLevel::ALL, LogLevel::ALL);
    telemetry::initialise(&sink, format)?;
    info!(
        target: LIFECYCLE_TARGET,
        config = %settings.config_path,
        socket = %settings.socket_path,
        "webby daemon starting"
    );
    let loader = FileOptionsLoader::new(settings.config_path.clone());
    Lifecycle::new(settings, loader, SystemTerminationSignals, sink).run()
}
