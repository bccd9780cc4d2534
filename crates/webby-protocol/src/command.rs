//! Command identifiers and their single-byte argument.

use std::fmt;

use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Operations a control invocation may request from the daemon.
///
/// The set is closed and shared by both sides at build time. Names that do
/// not parse into a variant are rejected by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Closes the HTTP listener and rebuilds the server from the loaded
    /// options, rescanning the content root.
    Restart,
    /// Re-reads the configuration file and restarts every daemon resource.
    Reload,
    /// Stops the daemon.
    Stop,
    /// Probes every routed path and reports an aggregate severity.
    Status,
    /// Sets the level mask for messages printed to standard error.
    #[strum(serialize = "log-print")]
    SetLogPrintLevel,
    /// Sets the level mask for messages recorded to the log file.
    #[strum(serialize = "log-record")]
    SetLogRecordLevel,
    /// Writes a default configuration file. Handled by the control
    /// invocation itself and never sent over the wire.
    #[strum(serialize = "gen-config")]
    GenerateConfig,
}

impl Command {
    /// Every command the daemon can be asked to dispatch.
    pub const WIRE: [Self; 6] = [
        Self::Restart,
        Self::Reload,
        Self::Stop,
        Self::Status,
        Self::SetLogPrintLevel,
        Self::SetLogRecordLevel,
    ];

    /// Returns the ASCII token used on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        self.into()
    }

    /// Returns `true` for commands that are executed by the control
    /// invocation rather than by the daemon.
    #[must_use]
    pub const fn is_client_side(self) -> bool {
        matches!(self, Self::GenerateConfig)
    }

    /// Resolves a raw command name as read from the wire.
    pub fn from_wire(name: &[u8]) -> Result<Self, UnknownCommand> {
        std::str::from_utf8(name)
            .ok()
            .and_then(|text| text.parse::<Self>().ok())
            .filter(|command| !command.is_client_side())
            .ok_or_else(|| UnknownCommand::new(name))
    }
}

/// A command name that does not identify a daemon command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{name}'")]
pub struct UnknownCommand {
    /// Lossy rendering of the received name.
    pub name: String,
}

impl UnknownCommand {
    fn new(raw: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(raw).into_owned(),
        }
    }
}

/// The single payload byte accompanying every command.
///
/// Its meaning is command-specific: lifecycle commands ignore it while the
/// log-level commands interpret it as a level bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CommandArgument(u8);

impl CommandArgument {
    /// Argument sent with commands that ignore their payload.
    pub const NONE: Self = Self(0);

    /// Wraps a raw payload byte.
    #[must_use]
    pub const fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw payload byte.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0
    }
}

impl From<u8> for CommandArgument {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

impl fmt::Display for CommandArgument {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:#04x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Command::Restart, "restart")]
    #[case(Command::Reload, "reload")]
    #[case(Command::Stop, "stop")]
    #[case(Command::Status, "status")]
    #[case(Command::SetLogPrintLevel, "log-print")]
    #[case(Command::SetLogRecordLevel, "log-record")]
    fn wire_names_match_protocol_tokens(#[case] command: Command, #[case] token: &str) {
        assert_eq!(command.wire_name(), token);
        assert_eq!(Command::from_wire(token.as_bytes()), Ok(command));
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"RESTART".as_slice())]
    #[case(b"gen-config".as_slice())]
    #[case(b"daemon".as_slice())]
    #[case(&[0xff, 0xfe])]
    fn unrecognised_names_fail_closed(#[case] name: &[u8]) {
        assert!(Command::from_wire(name).is_err());
    }

    #[test]
    fn generate_config_stays_client_side() {
        assert!(Command::GenerateConfig.is_client_side());
        assert!(!Command::WIRE.contains(&Command::GenerateConfig));
    }
}
