//! `webby`: a small static web server with a local control plane.
//!
//! One binary plays two roles. Run with `--daemon` (or detached with
//! `--start`) it serves a content root over HTTP and listens on a Unix
//! domain socket for control commands. Run with a control flag such as
//! `--reload` or `--status` it connects to that socket, sends one command per
//! connection and prints the outcome.
//!
//! The daemon side is organised around a [`lifecycle::Lifecycle`] loop that
//! owns the [`server`], the [`transport`] listener, the [`watcher`]s and the
//! [`logging::LogSink`]. Command [`handlers`] never block on that loop; they
//! post messages to it and return.

mod cli;
pub mod client;
mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod process;
pub mod server;
pub mod telemetry;
pub mod transport;
pub mod watcher;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

use webby_config::{ServerOptions, default_socket_path, load_options};

use self::cli::Cli;
use self::client::ControlOutput;
use self::lifecycle::DaemonSettings;
use self::process::DaemonLaunch;

pub use self::errors::AppError;

/// Parses `args`, runs the selected mode and maps the outcome to an exit
/// code. Errors are written to `stderr`.
pub fn run<I, T, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    let mut output = ControlOutput::new(stdout, stderr);
    match execute(&cli, &mut output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if !matches!(error, AppError::Client(_)) {
                // Client errors have already been explained line by line.
                writeln!(output.stderr, "webby: {error}").ok();
            }
            ExitCode::FAILURE
        }
    }
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            write!(stdout, "{}", error.render()).ok();
            ExitCode::SUCCESS
        }
        _ => {
            write!(stderr, "{}", error.render()).ok();
            ExitCode::FAILURE
        }
    }
}

fn execute<W: Write, E: Write>(
    cli: &Cli,
    output: &mut ControlOutput<&mut W, &mut E>,
) -> Result<(), AppError> {
    let socket = cli.socket.clone().unwrap_or_else(default_socket_path);

    if cli.daemon {
        let settings = DaemonSettings::new(cli.config.clone(), socket);
        return lifecycle::run_daemon(settings, cli.log_format).map_err(AppError::from);
    }

    if cli.gen_config {
        output.stdout_line(format_args!("Writing default config to '{}'...", cli.config))?;
        ServerOptions::default().write_to_path(&cli.config)?;
        output.stdout_line(format_args!("Done!"))?;
        return Ok(());
    }

    if cli.show_log {
        let (options, diagnostic) = load_options(&cli.config);
        if let Some(error) = diagnostic {
            output.stderr_line(format_args!("{error}; assuming the default log path"))?;
        }
        if let Err(error) = client::show_log(options.log_file(), output) {
            output.stderr_line(format_args!("{error}"))?;
            return Err(error.into());
        }
        return Ok(());
    }

    if cli.start {
        output.stdout_line(format_args!("Starting webby..."))?;
        let launch = DaemonLaunch {
            arguments: cli.daemon_arguments(&socket),
            socket,
            binary: std::env::var_os("WEBBY_BIN"),
        };
        let pid = process::start_forked_daemon(&launch)?;
        output.stdout_line(format_args!("Started webby! (pid {pid})"))?;
        return Ok(());
    }

    let request = cli.control_request();
    if request.is_empty() {
        return Err(AppError::NothingToDo);
    }
    client::run_control(&socket, &request, output)?;
    Ok(())
}

#[cfg(test)]
mod tests;
