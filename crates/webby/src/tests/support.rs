//! Fixtures for the end-to-end suites.

use std::fs;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use serde_json::json;
use tempfile::TempDir;

use webby_config::LogLevel;
use webby_protocol::{Command, CommandArgument, CommandResult};

use crate::client;
use crate::lifecycle::{
    DaemonSettings, FileOptionsLoader, Lifecycle, LifecycleError, OptionsLoader,
};
use crate::logging::LogSink;
use crate::process::{NoTerminationSignals, socket_is_reachable};

pub(super) const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// A content root, options file and socket path in a private directory.
pub(super) struct Workspace {
    _dir: TempDir,
    pub(super) site: Utf8PathBuf,
    pub(super) config: Utf8PathBuf,
    pub(super) socket: Utf8PathBuf,
    pub(super) log: Utf8PathBuf,
    pub(super) port: u16,
}

impl Workspace {
    /// Rewrites the options file.
    pub(super) fn write_config(&self, auto_reload: bool, dead_paths: &[&str]) {
        self.write_config_on_port(self.port, auto_reload, dead_paths);
    }

    /// Rewrites the options file with a different HTTP port.
    pub(super) fn write_config_on_port(&self, port: u16, auto_reload: bool, dead_paths: &[&str]) {
        let document = json!({
            "Site": self.site,
            "Port": port,
            "Log": self.log,
            "LogLevelPrint": "none",
            "LogLevelRecord": "all",
            "AutoReload": auto_reload,
            "DeadPaths": dead_paths,
        });
        fs::write(
            &self.config,
            serde_json::to_vec_pretty(&document).expect("serialise config"),
        )
        .expect("write config");
    }

    pub(super) fn settings(&self) -> DaemonSettings {
        DaemonSettings {
            config_path: self.config.clone(),
            socket_path: self.socket.clone(),
            watch_interval: WATCH_INTERVAL,
        }
    }

    pub(super) fn url(&self, path: &str) -> String {
        url_on(self.port, path)
    }
}

pub(super) fn url_on(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}

pub(super) fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    listener.local_addr().expect("ephemeral address").port()
}

#[fixture]
pub(super) fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
    let site = root.join("site");
    fs::create_dir_all(&site).expect("create site");
    fs::write(site.join("index.html"), "home").expect("write index");
    fs::write(site.join("about.html"), "about").expect("write about");
    let workspace = Workspace {
        config: root.join("config.json"),
        socket: root.join("run").join("webby.sock"),
        log: root.join("webby.log"),
        site,
        port: free_port(),
        _dir: dir,
    };
    workspace.write_config(false, &[]);
    workspace
}

/// A lifecycle loop running on a background thread.
pub(super) struct RunningDaemon {
    pub(super) sink: LogSink,
    pub(super) socket: Utf8PathBuf,
    thread: JoinHandle<Result<(), LifecycleError>>,
}

impl RunningDaemon {
    pub(super) fn spawn(workspace: &Workspace) -> Self {
        Self::spawn_with(workspace, FileOptionsLoader::new(workspace.config.clone()))
    }

    /// Runs a daemon that reads its options through `loader`.
    pub(super) fn spawn_with<L>(workspace: &Workspace, loader: L) -> Self
    where
        L: OptionsLoader + Send + 'static,
    {
        let sink = LogSink::new(LogLevel::ALL, LogLevel::ALL);
        let lifecycle = Lifecycle::new(
            workspace.settings(),
            loader,
            NoTerminationSignals,
            sink.clone(),
        );
        let thread = thread::spawn(move || lifecycle.run());
        let daemon = Self {
            sink,
            socket: workspace.socket.clone(),
            thread,
        };
        assert!(
            wait_until(|| reachable(&daemon.socket)),
            "daemon should open its control socket"
        );
        daemon
    }

    pub(super) fn send(&self, command: Command, argument: CommandArgument) -> CommandResult {
        client::send_command(&self.socket, command, argument).expect("exchange command")
    }

    /// Sends `stop` and waits for the loop to exit.
    pub(super) fn stop(self) -> Result<(), LifecycleError> {
        assert_eq!(
            self.send(Command::Stop, CommandArgument::NONE),
            CommandResult::SUCCESS
        );
        self.join()
    }

    pub(super) fn join(self) -> Result<(), LifecycleError> {
        self.thread.join().expect("join lifecycle thread")
    }
}

pub(super) fn reachable(socket: &Utf8Path) -> bool {
    socket_is_reachable(socket).unwrap_or(false)
}

/// Polls `condition` for up to five seconds.
pub(super) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    false
}
