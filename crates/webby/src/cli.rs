//! Command-line interface definition.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;

use webby_config::{DEFAULT_CONFIG_PATH, LogFormat};

use crate::client::ControlRequest;

/// Static web server with a local control socket.
#[derive(Parser, Debug)]
#[command(name = "webby", version)]
pub(crate) struct Cli {
    /// Runs the daemon in the foreground.
    #[arg(long)]
    pub(crate) daemon: bool,
    /// Starts the daemon as a detached background process.
    #[arg(long)]
    pub(crate) start: bool,
    /// Prints the daemon's log file.
    #[arg(long)]
    pub(crate) show_log: bool,
    /// Writes the default configuration to the config path.
    #[arg(long)]
    pub(crate) gen_config: bool,
    /// Restarts the HTTP server, rescanning the site.
    #[arg(long)]
    pub(crate) restart: bool,
    /// Reloads the configuration and restarts everything.
    #[arg(long)]
    pub(crate) reload: bool,
    /// Stops the daemon.
    #[arg(long)]
    pub(crate) stop: bool,
    /// Probes every hosted path and reports the daemon's health.
    #[arg(long)]
    pub(crate) status: bool,
    /// Sets the log level recorded to file (error, warning, info, all, none).
    #[arg(long, value_name = "LEVEL")]
    pub(crate) log_record: Option<String>,
    /// Sets the log level printed to standard error.
    #[arg(long, value_name = "LEVEL")]
    pub(crate) log_print: Option<String>,
    /// Path of the JSON configuration file.
    #[arg(long, env = "WEBBY_CONFIG", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub(crate) config: Utf8PathBuf,
    /// Path of the control socket.
    #[arg(long, env = "WEBBY_SOCKET", value_name = "PATH")]
    pub(crate) socket: Option<Utf8PathBuf>,
    /// Daemon log output format.
    #[arg(long, value_name = "FORMAT", default_value_t = LogFormat::default())]
    pub(crate) log_format: LogFormat,
}

impl Cli {
    /// The control commands requested on this invocation.
    pub(crate) fn control_request(&self) -> ControlRequest {
        ControlRequest {
            log_record: self.log_record.clone(),
            log_print: self.log_print.clone(),
            restart: self.restart,
            reload: self.reload,
            stop: self.stop,
            status: self.status,
        }
    }

    /// Arguments forwarded to a detached daemon so it uses the same paths.
    pub(crate) fn daemon_arguments(&self, socket: &Utf8Path) -> Vec<OsString> {
        vec![
            OsString::from("--config"),
            OsString::from(self.config.as_str()),
            OsString::from("--socket"),
            OsString::from(socket.as_str()),
            OsString::from("--log-format"),
            OsString::from(self.log_format.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(arguments: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("webby").chain(arguments.iter().copied()))
            .expect("parse arguments")
    }

    #[test]
    fn flags_map_onto_the_control_request() {
        let cli = parse(&["--restart", "--status", "--log-print", "warn"]);

        assert_eq!(
            cli.control_request(),
            ControlRequest {
                log_print: Some("warn".to_owned()),
                restart: true,
                status: true,
                ..ControlRequest::default()
            }
        );
    }

    #[rstest]
    #[case(&["--daemon"])]
    #[case(&["--gen-config"])]
    #[case(&["--show-log"])]
    #[case(&["--start"])]
    fn mode_flags_request_no_control_commands(#[case] arguments: &[&str]) {
        assert!(parse(arguments).control_request().is_empty());
    }

    #[test]
    fn daemon_arguments_forward_paths_and_format() {
        let cli = parse(&["--config", "/tmp/webby.json", "--log-format", "json"]);
        let socket = Utf8PathBuf::from("/tmp/webby.sock");

        assert_eq!(
            cli.daemon_arguments(&socket),
            [
                "--config",
                "/tmp/webby.json",
                "--socket",
                "/tmp/webby.sock",
                "--log-format",
                "json",
            ]
            .map(OsString::from)
        );
    }
}
