//! Operator-side control client.
//!
//! Each command travels over its own connection: one request out, one
//! result byte back. The client prints one statement per attempted command
//! and never rolls back earlier commands when a later one fails.

mod errors;
mod output;

use std::fs;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use camino::Utf8Path;

use webby_config::LogLevel;
use webby_protocol::{Command, CommandArgument, CommandResult, StatusSeverity, encode_request};

pub use self::errors::ClientError;
pub use self::output::ControlOutput;

/// The control commands requested on one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlRequest {
    /// Level text for `log-record`.
    pub log_record: Option<String>,
    /// Level text for `log-print`.
    pub log_print: Option<String>,
    /// Send `restart`.
    pub restart: bool,
    /// Send `reload`.
    pub reload: bool,
    /// Send `stop`.
    pub stop: bool,
    /// Send `status` and report the severity.
    pub status: bool,
}

impl ControlRequest {
    /// Returns `true` when no command was requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.log_record.is_none()
            && self.log_print.is_none()
            && !self.restart
            && !self.reload
            && !self.stop
            && !self.status
    }
}

/// Sends one command and returns the daemon's answer.
pub fn send_command(
    socket: &Utf8Path,
    command: Command,
    argument: CommandArgument,
) -> Result<CommandResult, ClientError> {
    let mut stream = UnixStream::connect(socket).map_err(|source| ClientError::Unreachable {
        socket: socket.to_path_buf(),
        source,
    })?;
    let exchange = |source| ClientError::Exchange { command, source };
    stream
        .write_all(&encode_request(command, argument))
        .map_err(exchange)?;
    let mut reply = [0_u8; 1];
    stream.read_exact(&mut reply).map_err(exchange)?;
    let [byte] = reply;
    Ok(CommandResult::from_byte(byte))
}

/// Runs every requested command in a fixed order: log-record, log-print,
/// restart, reload, stop, status.
pub fn run_control<W: Write, E: Write>(
    socket: &Utf8Path,
    request: &ControlRequest,
    output: &mut ControlOutput<W, E>,
) -> Result<(), ClientError> {
    let mut session = Session {
        socket,
        output,
        explain_socket: request.status,
        failed: 0,
    };
    if let Some(text) = &request.log_record {
        session.set_level(Command::SetLogRecordLevel, text, "recording")?;
    }
    if let Some(text) = &request.log_print {
        session.set_level(Command::SetLogPrintLevel, text, "printing")?;
    }
    if request.restart {
        session.simple(
            Command::Restart,
            "Restarting webby...",
            "Restarted!",
            "Could not restart webby correctly",
        )?;
    }
    if request.reload {
        session.simple(
            Command::Reload,
            "Reloading config and restarting webby...",
            "Reloaded and restarted!",
            "Could not reload config or restart",
        )?;
    }
    if request.stop {
        session.simple(Command::Stop, "Stopping webby...", "Stopped!", "Could not stop webby")?;
    }
    if request.status {
        session.status()?;
    }

    match session.failed {
        0 => Ok(()),
        failed => Err(ClientError::CommandsFailed { failed }),
    }
}

struct Session<'a, W: Write, E: Write> {
    socket: &'a Utf8Path,
    output: &'a mut ControlOutput<W, E>,
    explain_socket: bool,
    failed: usize,
}

impl<W: Write, E: Write> Session<'_, W, E> {
    /// Sends one command. An unreachable socket aborts the whole run; any
    /// other failure is reported and counted.
    fn exchange(
        &mut self,
        command: Command,
        argument: CommandArgument,
    ) -> Result<Option<CommandResult>, ClientError> {
        match send_command(self.socket, command, argument) {
            Ok(result) => Ok(Some(result)),
            Err(error @ ClientError::Unreachable { .. }) => {
                self.output.stderr_line(format_args!(
                    "Could not open Unix Domain Socket, webby may not be running or you may need elevated privileges"
                ))?;
                if self.explain_socket {
                    self.output.stderr_line(format_args!(
                        "webby's daemon uses a Unix Domain Socket ({}) for control",
                        self.socket
                    ))?;
                    self.output.stderr_line(format_args!(
                        "being unable to open the socket likely means webby is not running"
                    ))?;
                }
                Err(error)
            }
            Err(error) => {
                self.failed += 1;
                self.output.stderr_line(format_args!("{error}"))?;
                Ok(None)
            }
        }
    }

    fn simple(
        &mut self,
        command: Command,
        before: &str,
        succeeded: &str,
        failed: &str,
    ) -> Result<(), ClientError> {
        self.output.stdout_line(format_args!("{before}"))?;
        match self.exchange(command, CommandArgument::NONE)? {
            Some(result) if result.is_success() => {
                self.output.stdout_line(format_args!("{succeeded}"))?;
            }
            Some(_) => {
                self.failed += 1;
                self.output.stderr_line(format_args!("{failed}"))?;
            }
            None => {}
        }
        Ok(())
    }

    fn set_level(
        &mut self,
        command: Command,
        text: &str,
        destination: &str,
    ) -> Result<(), ClientError> {
        let level = match LogLevel::parse(text) {
            Ok(level) => level,
            Err(_) => {
                self.failed += 1;
                self.output.stderr_line(format_args!(
                    "Could not identify log level from given argument ({text})"
                ))?;
                self.output
                    .stderr_line(format_args!("try using 'error', 'warning', 'info', or 'all'"))?;
                return Ok(());
            }
        };
        match self.exchange(command, CommandArgument::new(level.bits()))? {
            Some(result) if result.is_success() => {
                self.output.stdout_line(format_args!(
                    "Log level for {destination} changed to '{text}'"
                ))?;
            }
            Some(_) => {
                self.failed += 1;
                self.output
                    .stderr_line(format_args!("Could not change log level for {destination}"))?;
            }
            None => {}
        }
        Ok(())
    }

    fn status(&mut self) -> Result<(), ClientError> {
        self.output
            .stdout_line(format_args!("Requesting status from webby..."))?;
        let Some(result) = self.exchange(Command::Status, CommandArgument::NONE)? else {
            return Ok(());
        };
        let Some(severity) = result.status() else {
            self.failed += 1;
            self.output
                .stderr_line(format_args!("Could not get status from webby"))?;
            return Ok(());
        };
        if severity.is_failure() {
            self.failed += 1;
        }
        self.output.stdout_line(format_args!("\nstatus: {severity}\n"))?;
        self.output
            .stdout_line(format_args!("{}\n", describe(severity)))?;
        Ok(())
    }
}

const fn describe(severity: StatusSeverity) -> &'static str {
    match severity {
        StatusSeverity::Ok => {
            "webby made HTTP GET requests to all hosted paths and got 200 for each."
        }
        StatusSeverity::HttpNon2xx => {
            "webby made HTTP GET requests to all hosted paths, all responded but some did not give 200."
        }
        StatusSeverity::HttpPartialFail => {
            "webby made HTTP GET requests to all hosted paths but some responded with a failure code, e.g. 400."
        }
        StatusSeverity::HttpFail => {
            "webby made HTTP GET requests to all hosted paths and all responded with a failure code, e.g. 400."
        }
    }
}

/// Prints the daemon's log file to stdout.
pub fn show_log<W: Write, E: Write>(
    path: Option<&Utf8Path>,
    output: &mut ControlOutput<W, E>,
) -> Result<(), ClientError> {
    let path = path.ok_or(ClientError::NoLogFile)?;
    let contents = fs::read(path).map_err(|source| ClientError::ReadLog {
        path: path.to_path_buf(),
        source,
    })?;
    output.stdout.write_all(&contents)?;
    output.stdout.flush()?;
    Ok(())
}
