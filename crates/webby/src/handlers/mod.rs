//! Daemon-side command handlers.
//!
//! Each handler is a closure from a [`CommandArgument`] to a
//! [`CommandResult`]. Handlers never block on the lifecycle loop: they post a
//! message to a channel or flip an atomic and return.

mod status;

use std::collections::HashMap;
use std::sync::mpsc::Sender;

use tracing::{info, warn};

use webby_config::LogLevel;
use webby_protocol::{Command, CommandArgument, CommandResult};

use crate::lifecycle::LifecycleSignal;
use crate::logging::LogSink;
use crate::server::ServerCommand;

pub use self::status::{HttpProber, PathProber, ProbeOutcome, StatusProbe, classify};

const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handlers");

/// Callback invoked for one command.
pub type CommandCallback = Box<dyn Fn(CommandArgument) -> CommandResult + Send + Sync>;

/// Maps wire commands to their callbacks.
#[derive(Default)]
pub struct CommandTable {
    callbacks: HashMap<Command, CommandCallback>,
}

impl CommandTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `command`, replacing any previous entry.
    #[must_use]
    pub fn with<F>(mut self, command: Command, callback: F) -> Self
    where
        F: Fn(CommandArgument) -> CommandResult + Send + Sync + 'static,
    {
        self.callbacks.insert(command, Box::new(callback));
        self
    }

    /// Looks up the callback for `command`.
    #[must_use]
    pub fn get(&self, command: Command) -> Option<&CommandCallback> {
        self.callbacks.get(&command)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// Asks the HTTP server thread to rebuild itself.
pub fn restart(server: Sender<ServerCommand>) -> impl Fn(CommandArgument) -> CommandResult {
    move |_| match server.send(ServerCommand::Restart) {
        Ok(()) => {
            info!(target: HANDLER_TARGET, "HTTP server restart requested");
            CommandResult::SUCCESS
        }
        Err(_) => {
            warn!(target: HANDLER_TARGET, "HTTP server is not running; restart ignored");
            CommandResult::FAILURE
        }
    }
}

/// Asks the lifecycle loop to tear down and reload.
pub fn reload(signals: Sender<LifecycleSignal>) -> impl Fn(CommandArgument) -> CommandResult {
    post(signals, LifecycleSignal::Reload)
}

/// Asks the lifecycle loop to tear down and exit.
pub fn stop(signals: Sender<LifecycleSignal>) -> impl Fn(CommandArgument) -> CommandResult {
    post(signals, LifecycleSignal::Stop)
}

fn post(
    signals: Sender<LifecycleSignal>,
    signal: LifecycleSignal,
) -> impl Fn(CommandArgument) -> CommandResult {
    move |_| match signals.send(signal) {
        Ok(()) => {
            info!(target: HANDLER_TARGET, signal = %signal, "lifecycle signal posted");
            CommandResult::SUCCESS
        }
        Err(_) => {
            warn!(target: HANDLER_TARGET, signal = %signal, "lifecycle loop is not listening");
            CommandResult::FAILURE
        }
    }
}

/// Replaces the print level with the level carried in the argument.
pub fn log_print(sink: LogSink) -> impl Fn(CommandArgument) -> CommandResult {
    move |argument| {
        let level = checked_level(argument, "print");
        sink.set_print_level(level);
        info!(target: HANDLER_TARGET, level = %level, "print level changed");
        CommandResult::SUCCESS
    }
}

/// Replaces the record level with the level carried in the argument.
pub fn log_record(sink: LogSink) -> impl Fn(CommandArgument) -> CommandResult {
    move |argument| {
        let level = checked_level(argument, "record");
        sink.set_record_level(level);
        info!(target: HANDLER_TARGET, level = %level, "record level changed");
        CommandResult::SUCCESS
    }
}

fn checked_level(argument: CommandArgument, destination: &str) -> LogLevel {
    LogLevel::check(argument.byte()).unwrap_or_else(|error| {
        warn!(
            target: HANDLER_TARGET,
            error = %error,
            destination,
            "invalid log level received, using 'all'"
        );
        LogLevel::ALL
    })
}

/// Probes every hosted path and answers with the encoded severity.
pub fn status(probe: StatusProbe) -> impl Fn(CommandArgument) -> CommandResult {
    move |_| {
        let severity = probe.run();
        info!(target: HANDLER_TARGET, status = %severity, "status probe finished");
        CommandResult::from_status(severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::mpsc;

    #[test]
    fn restart_posts_to_the_server_thread() {
        let (sender, receiver) = mpsc::channel();
        let handler = restart(sender);

        assert_eq!(handler(CommandArgument::NONE), CommandResult::SUCCESS);
        assert_eq!(receiver.try_recv().ok(), Some(ServerCommand::Restart));
    }

    #[test]
    fn restart_fails_once_the_server_thread_is_gone() {
        let (sender, receiver) = mpsc::channel();
        drop(receiver);

        assert_eq!(restart(sender)(CommandArgument::NONE), CommandResult::FAILURE);
    }

    #[rstest]
    #[case(Command::Reload, LifecycleSignal::Reload)]
    #[case(Command::Stop, LifecycleSignal::Stop)]
    fn lifecycle_handlers_post_their_signal(
        #[case] command: Command,
        #[case] expected: LifecycleSignal,
    ) {
        let (sender, receiver) = mpsc::channel();
        let handler: CommandCallback = match command {
            Command::Reload => Box::new(reload(sender)),
            _ => Box::new(stop(sender)),
        };

        assert_eq!(handler(CommandArgument::NONE), CommandResult::SUCCESS);
        assert_eq!(receiver.try_recv().ok(), Some(expected));
    }

    #[rstest]
    #[case(0b0000_0001, LogLevel::ERR)]
    #[case(0b0000_0101, LogLevel::ERR | LogLevel::INFO)]
    #[case(0b0000_0000, LogLevel::NONE)]
    #[case(0b0000_1000, LogLevel::ALL)]
    #[case(0xff, LogLevel::ALL)]
    fn log_level_handlers_apply_checked_levels(#[case] byte: u8, #[case] expected: LogLevel) {
        let sink = LogSink::new(LogLevel::ERR, LogLevel::ERR);

        assert_eq!(
            log_print(sink.clone())(CommandArgument::new(byte)),
            CommandResult::SUCCESS
        );
        assert_eq!(
            log_record(sink.clone())(CommandArgument::new(byte)),
            CommandResult::SUCCESS
        );
        assert_eq!(sink.print_level(), expected);
        assert_eq!(sink.record_level(), expected);
    }

    #[test]
    fn print_and_record_levels_are_independent() {
        let sink = LogSink::new(LogLevel::ALL, LogLevel::ALL);

        log_record(sink.clone())(CommandArgument::new(LogLevel::ERR.bits()));

        assert_eq!(sink.print_level(), LogLevel::ALL);
        assert_eq!(sink.record_level(), LogLevel::ERR);
    }
}
