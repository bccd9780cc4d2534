//! Behaviour of a running daemon as seen through its control socket.

use std::fs::{self, File};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use rstest::rstest;

use camino::Utf8PathBuf;
use webby_config::{ConfigError, LogLevel, ServerOptions, load_options};
use webby_protocol::{Command, CommandArgument, CommandResult, StatusSeverity};

use crate::lifecycle::{FileOptionsLoader, Lifecycle, LifecycleError, OptionsLoader};
use crate::logging::LogSink;
use crate::process::NoTerminationSignals;

use super::support::{
    RunningDaemon, Workspace, free_port, reachable, url_on, wait_until, workspace,
};

fn http() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .expect("build client")
}

fn status_of(daemon: &RunningDaemon) -> Option<StatusSeverity> {
    daemon.send(Command::Status, CommandArgument::NONE).status()
}

#[rstest]
fn reload_rebinds_the_server_and_keeps_the_control_socket(workspace: Workspace) {
    let daemon = RunningDaemon::spawn(&workspace);
    let client = http();
    let about = client
        .get(workspace.url("/about.html"))
        .send()
        .expect("get page before reload");
    assert_eq!(about.status(), StatusCode::OK);

    let moved = free_port();
    workspace.write_config_on_port(moved, false, &["/about.html"]);
    assert_eq!(
        daemon.send(Command::Reload, CommandArgument::NONE),
        CommandResult::SUCCESS
    );

    assert!(
        wait_until(|| {
            client
                .get(url_on(moved, "/about.html"))
                .send()
                .is_ok_and(|response| response.status() == StatusCode::MOVED_PERMANENTLY)
        }),
        "reloaded server should serve the new options on the new port"
    );
    assert!(
        client.get(workspace.url("/")).send().is_err(),
        "the original listener should be closed"
    );
    assert!(wait_until(|| reachable(&daemon.socket)));
    assert!(
        wait_until(|| {
            crate::client::send_command(&daemon.socket, Command::Status, CommandArgument::NONE)
                .is_ok_and(|result| result.status() == Some(StatusSeverity::HttpNon2xx))
        }),
        "status should check the reloaded server, where the dead page redirects"
    );

    daemon.stop().expect("daemon exits cleanly");
    assert!(!workspace.socket.exists(), "socket file is removed on exit");
}

#[rstest]
fn status_reflects_missing_files(workspace: Workspace) {
    let daemon = RunningDaemon::spawn(&workspace);
    assert_eq!(status_of(&daemon), Some(StatusSeverity::Ok));

    fs::remove_file(workspace.site.join("about.html")).expect("remove page");
    assert_eq!(status_of(&daemon), Some(StatusSeverity::HttpPartialFail));

    daemon.stop().expect("daemon exits cleanly");
}

#[rstest]
fn restart_picks_up_new_pages(workspace: Workspace) {
    let daemon = RunningDaemon::spawn(&workspace);
    let client = http();
    fs::write(workspace.site.join("news.html"), "news").expect("write page");

    assert_eq!(
        daemon.send(Command::Restart, CommandArgument::NONE),
        CommandResult::SUCCESS
    );

    assert!(wait_until(|| {
        client
            .get(workspace.url("/news.html"))
            .send()
            .is_ok_and(|response| response.status() == StatusCode::OK)
    }));
    daemon.stop().expect("daemon exits cleanly");
}

#[rstest]
fn log_levels_round_trip_and_clamp(workspace: Workspace) {
    let daemon = RunningDaemon::spawn(&workspace);
    assert_eq!(daemon.sink.print_level(), LogLevel::NONE);

    let warnings = LogLevel::ERR | LogLevel::WARN;
    assert_eq!(
        daemon.send(Command::SetLogRecordLevel, CommandArgument::new(warnings.bits())),
        CommandResult::SUCCESS
    );
    assert_eq!(daemon.sink.record_level(), warnings);

    assert_eq!(
        daemon.send(Command::SetLogPrintLevel, CommandArgument::new(0x40)),
        CommandResult::SUCCESS
    );
    assert_eq!(daemon.sink.print_level(), LogLevel::ALL);

    daemon.stop().expect("daemon exits cleanly");
}

#[rstest]
fn unknown_commands_fail_without_disturbing_the_daemon(workspace: Workspace) {
    let daemon = RunningDaemon::spawn(&workspace);

    let reply = crate::transport::exchange(daemon.socket.as_std_path(), b"launch-missiles\x00")
        .expect("exchange unknown command");
    assert_eq!(reply, vec![CommandResult::FAILURE.byte()]);

    assert_eq!(status_of(&daemon), Some(StatusSeverity::Ok));
    daemon.stop().expect("daemon exits cleanly");
}

#[rstest]
fn config_changes_trigger_a_reload(workspace: Workspace) {
    workspace.write_config(true, &[]);
    let daemon = RunningDaemon::spawn(&workspace);
    let client = http();

    workspace.write_config(true, &["/about.html"]);

    assert!(
        wait_until(|| {
            client
                .get(workspace.url("/about.html"))
                .send()
                .is_ok_and(|response| response.status() == StatusCode::MOVED_PERMANENTLY)
        }),
        "reloaded options should mark the page dead"
    );
    assert!(wait_until(|| reachable(&daemon.socket)));
    daemon.stop().expect("daemon exits cleanly");
}

/// Reads the options, then replaces the file before loading completes.
struct EditWhileLoading {
    path: Utf8PathBuf,
    edit: Mutex<Option<Vec<u8>>>,
}

impl OptionsLoader for EditWhileLoading {
    fn load(&self) -> (ServerOptions, Option<ConfigError>) {
        let loaded = load_options(&self.path);
        if let Some(document) = self.edit.lock().expect("edit lock").take() {
            fs::write(&self.path, document).expect("edit config");
            File::options()
                .write(true)
                .open(&self.path)
                .expect("open config")
                .set_modified(SystemTime::now() + Duration::from_secs(60))
                .expect("bump mtime");
        }
        loaded
    }
}

#[rstest]
fn config_edits_made_while_loading_trigger_a_reload(workspace: Workspace) {
    workspace.write_config(true, &["/about.html"]);
    let edited = fs::read(&workspace.config).expect("read edited config");
    workspace.write_config(true, &[]);
    let loader = EditWhileLoading {
        path: workspace.config.clone(),
        edit: Mutex::new(Some(edited)),
    };
    let daemon = RunningDaemon::spawn_with(&workspace, loader);
    let client = http();

    assert!(
        wait_until(|| {
            client
                .get(workspace.url("/about.html"))
                .send()
                .is_ok_and(|response| response.status() == StatusCode::MOVED_PERMANENTLY)
        }),
        "an edit racing the first load should still be picked up"
    );
    assert!(wait_until(|| reachable(&daemon.socket)));
    daemon.stop().expect("daemon exits cleanly");
}

#[rstest]
fn second_daemon_on_the_same_socket_exits(workspace: Workspace) {
    let daemon = RunningDaemon::spawn(&workspace);
    let second = Lifecycle::new(
        workspace.settings(),
        FileOptionsLoader::new(workspace.config.clone()),
        NoTerminationSignals,
        LogSink::new(LogLevel::NONE, LogLevel::NONE),
    );

    let error = second.run().expect_err("second daemon must not serve");
    assert!(matches!(error, LifecycleError::AlreadyRunning { .. }));
    assert!(reachable(&daemon.socket), "first daemon keeps its socket");

    daemon.stop().expect("daemon exits cleanly");
}

#[rstest]
fn missing_site_root_is_fatal(workspace: Workspace) {
    fs::remove_dir_all(&workspace.site).expect("remove site");
    let lifecycle = Lifecycle::new(
        workspace.settings(),
        FileOptionsLoader::new(workspace.config.clone()),
        NoTerminationSignals,
        LogSink::new(LogLevel::NONE, LogLevel::NONE),
    );

    let error = lifecycle.run().expect_err("daemon cannot serve");
    assert!(matches!(error, LifecycleError::Server(_)));
    assert!(!reachable(&workspace.socket));
}
