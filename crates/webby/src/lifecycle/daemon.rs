//! Everything a serving daemon owns, and the order it is torn down in.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::{debug, error, info, warn};

use webby_config::{LogLevel, LogLevelError, ServerOptions, prepare_socket_directory};
use webby_protocol::Command;

use crate::handlers::{self, CommandTable, HttpProber, StatusProbe};
use crate::process::{SignalForwarder, TerminationSignals};
use crate::server::{HttpServer, RoutedPaths, ServerCommand, ServerHandle};
use crate::transport::{CommandListener, DispatchConnectionHandler, ListenerHandle};
use crate::watcher::{self, WatchEvent, WatchHandle, WatchTarget};

use super::{LIFECYCLE_TARGET, Lifecycle, LifecycleError, LifecycleSignal, OptionsLoader};

pub(super) struct Daemon {
    listener: Option<ListenerHandle>,
    server: ServerHandle,
    watchers: Vec<WatchHandle>,
    forwarder: SignalForwarder,
    signals: Receiver<LifecycleSignal>,
}

impl Daemon {
    pub(super) fn load<L, T>(lifecycle: &Lifecycle<L, T>) -> Result<Self, LifecycleError>
    where
        L: OptionsLoader,
        T: TerminationSignals,
    {
        // Baseline before reading, so edits made while loading still count.
        let config_target = WatchTarget::observed(lifecycle.settings().config_path.as_std_path());
        let (options, diagnostic) = lifecycle.loader().load();
        if let Some(error) = diagnostic {
            error!(target: LIFECYCLE_TARGET, error = %error, "could not load configuration");
            warn!(target: LIFECYCLE_TARGET, "using default configuration");
        }
        open_log(lifecycle, &options);
        apply_levels(lifecycle, &options);

        let server = HttpServer::new(&options)?;
        let listener = bind_listener(lifecycle)?;

        let (signal_tx, signal_rx) = mpsc::channel();
        let routes = RoutedPaths::new(server.routed_paths().to_vec());
        let server = server.start_threaded(routes.clone(), signal_tx.clone())?;
        let forwarder = match lifecycle.termination().forward(signal_tx.clone()) {
            Ok(forwarder) => forwarder,
            Err(error) => {
                stop_server(server);
                return Err(error.into());
            }
        };

        let table = command_table(lifecycle, &server, &signal_tx, routes);
        let listener = listener.and_then(|listener| start_listener(listener, table));
        let watchers = if options.auto_reload {
            start_watchers(lifecycle, config_target, &options, &signal_tx, &server)
        } else {
            Vec::new()
        };

        info!(
            target: LIFECYCLE_TARGET,
            addr = %server.local_addr(),
            control = listener.is_some(),
            watchers = watchers.len(),
            "webby is serving"
        );
        Ok(Self {
            listener,
            server,
            watchers,
            forwarder,
            signals: signal_rx,
        })
    }

    /// Blocks until a signal arrives.
    pub(super) fn wait(&self) -> LifecycleSignal {
        self.signals.recv().unwrap_or(LifecycleSignal::Stop)
    }

    /// Stops the watchers, then closes and drains the listener, then stops
    /// the HTTP server and the signal forwarder.
    pub(super) fn teardown(self) {
        for watcher in self.watchers {
            watcher.stop();
        }
        if let Some(listener) = self.listener {
            info!(target: LIFECYCLE_TARGET, "closing control socket");
            if let Err(error) = listener.close() {
                warn!(target: LIFECYCLE_TARGET, error = %error, "control socket closed with error");
            }
        }
        stop_server(self.server);
        self.forwarder.close();
    }
}

fn stop_server(server: ServerHandle) {
    info!(target: LIFECYCLE_TARGET, "stopping HTTP server");
    if let Err(error) = server.stop() {
        warn!(target: LIFECYCLE_TARGET, error = %error, "HTTP server stopped with error");
    }
}

fn open_log<L, T>(lifecycle: &Lifecycle<L, T>, options: &ServerOptions) {
    let Some(path) = options.log_file() else {
        debug!(target: LIFECYCLE_TARGET, "no log file configured");
        return;
    };
    match lifecycle.sink().open_file(path) {
        Ok(()) => info!(target: LIFECYCLE_TARGET, path = %path, "recording log"),
        Err(error) => error!(target: LIFECYCLE_TARGET, error = %error, "could not open log file"),
    }
}

fn apply_levels<L, T>(lifecycle: &Lifecycle<L, T>, options: &ServerOptions) {
    let sink = lifecycle.sink();
    sink.set_print_level(clamp_level(options.print_level(), "print"));
    sink.set_record_level(clamp_level(options.record_level(), "record"));
}

fn clamp_level(level: Result<LogLevel, LogLevelError>, destination: &str) -> LogLevel {
    level.unwrap_or_else(|error| {
        error!(target: LIFECYCLE_TARGET, error = %error, destination, "invalid log level");
        warn!(target: LIFECYCLE_TARGET, destination, "using log level 'all'");
        LogLevel::ALL
    })
}

/// Binds the control socket. Only a socket already served by another
/// process is fatal; anything else leaves the daemon without control.
fn bind_listener<L, T>(
    lifecycle: &Lifecycle<L, T>,
) -> Result<Option<CommandListener>, LifecycleError> {
    let socket = lifecycle.settings().socket();
    if let Err(error) = prepare_socket_directory(socket) {
        error!(target: LIFECYCLE_TARGET, error = %error, "could not prepare control socket");
        warn!(target: LIFECYCLE_TARGET, "control commands are unavailable");
        return Ok(None);
    }
    match CommandListener::bind(socket) {
        Ok(listener) => Ok(Some(listener)),
        Err(error) if error.is_in_use() => Err(LifecycleError::AlreadyRunning {
            socket: socket.to_path_buf(),
        }),
        Err(error) => {
            error!(target: LIFECYCLE_TARGET, error = %error, "could not bind control socket");
            warn!(target: LIFECYCLE_TARGET, "control commands are unavailable");
            Ok(None)
        }
    }
}

fn start_listener(listener: CommandListener, table: CommandTable) -> Option<ListenerHandle> {
    match listener.start(Arc::new(DispatchConnectionHandler::new(table))) {
        Ok(handle) => Some(handle),
        Err(error) => {
            error!(target: LIFECYCLE_TARGET, error = %error, "could not start control socket");
            warn!(target: LIFECYCLE_TARGET, "control commands are unavailable");
            None
        }
    }
}

fn command_table<L, T>(
    lifecycle: &Lifecycle<L, T>,
    server: &ServerHandle,
    signals: &Sender<LifecycleSignal>,
    routes: RoutedPaths,
) -> CommandTable {
    let prober = Arc::new(HttpProber::new(server.local_addr().port()));
    CommandTable::new()
        .with(Command::Restart, handlers::restart(server.commands()))
        .with(Command::Reload, handlers::reload(signals.clone()))
        .with(Command::Stop, handlers::stop(signals.clone()))
        .with(
            Command::Status,
            handlers::status(StatusProbe::new(prober, routes)),
        )
        .with(
            Command::SetLogPrintLevel,
            handlers::log_print(lifecycle.sink().clone()),
        )
        .with(
            Command::SetLogRecordLevel,
            handlers::log_record(lifecycle.sink().clone()),
        )
}

fn start_watchers<L, T>(
    lifecycle: &Lifecycle<L, T>,
    config_target: WatchTarget,
    options: &ServerOptions,
    signals: &Sender<LifecycleSignal>,
    server: &ServerHandle,
) -> Vec<WatchHandle> {
    let interval = lifecycle.settings().watch_interval;
    let mut watchers = Vec::with_capacity(2);

    let reload = signals.clone();
    match watcher::watch_target(config_target, interval, move |event| {
        on_config_event(&reload, event)
    }) {
        Ok(handle) => watchers.push(handle),
        Err(error) => warn!(target: LIFECYCLE_TARGET, error = %error, "config watcher failed"),
    }

    let restart = server.commands();
    match watcher::watch(options.site_root().as_std_path(), interval, move |event| {
        on_site_event(&restart, event)
    }) {
        Ok(handle) => watchers.push(handle),
        Err(error) => warn!(target: LIFECYCLE_TARGET, error = %error, "site watcher failed"),
    }
    watchers
}

fn on_config_event(reload: &Sender<LifecycleSignal>, event: WatchEvent) -> bool {
    match event {
        WatchEvent::TimeModifiedChange | WatchEvent::SizeChange => {
            info!(target: LIFECYCLE_TARGET, "configuration changed, reloading");
            if reload.send(LifecycleSignal::Reload).is_err() {
                debug!(target: LIFECYCLE_TARGET, "lifecycle loop already gone");
            }
            true
        }
        WatchEvent::InitialReadError(error) => {
            warn!(target: LIFECYCLE_TARGET, error = %error, "could not read configuration for watching");
            false
        }
        WatchEvent::ReadError(error) => {
            debug!(target: LIFECYCLE_TARGET, error = %error, "configuration unreadable");
            false
        }
    }
}

fn on_site_event(restart: &Sender<ServerCommand>, event: WatchEvent) -> bool {
    match event {
        WatchEvent::TimeModifiedChange | WatchEvent::SizeChange => {
            info!(target: LIFECYCLE_TARGET, "site changed, restarting HTTP server");
            // A closed channel means the server is gone and teardown is near.
            restart.send(ServerCommand::Restart).is_err()
        }
        WatchEvent::InitialReadError(error) | WatchEvent::ReadError(error) => {
            debug!(target: LIFECYCLE_TARGET, error = %error, "site root unreadable");
            false
        }
    }
}
