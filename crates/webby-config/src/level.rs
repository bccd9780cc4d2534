use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Bitmask selecting which message severities reach a log destination.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LogLevel: u8 {
        /// Errors.
        const ERR = 1;
        /// Warnings.
        const WARN = 1 << 1;
        /// Informational messages.
        const INFO = 1 << 2;
    }
}

/// Errors raised while interpreting a log level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogLevelError {
    /// Configuration or operator text did not name a level.
    #[error("could not identify log level from '{0}'; try 'error', 'warning', 'info', or 'all'")]
    Unrecognised(String),
    /// A wire byte set bits outside the defined levels.
    #[error("log level byte {0:#04x} sets undefined bits")]
    OutOfRange(u8),
}

impl LogLevel {
    /// Nothing is logged.
    pub const NONE: Self = Self::empty();
    /// Everything is logged. Used as the fallback for invalid input.
    pub const ALL: Self = Self::all();

    /// Parses operator or configuration text, case-insensitively.
    ///
    /// Each named severity includes the ones more severe than it, so
    /// `"warning"` selects errors and warnings.
    pub fn parse(text: &str) -> Result<Self, LogLevelError> {
        match text.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::NONE),
            "errors" | "error" | "err" | "e" => Ok(Self::ERR),
            "warnings" | "warning" | "warn" | "war" | "w" => Ok(Self::ERR | Self::WARN),
            "information" | "info" | "inf" | "i" | "all" | "a" => Ok(Self::ALL),
            _ => Err(LogLevelError::Unrecognised(text.to_owned())),
        }
    }

    /// Validates a byte received over the control channel.
    ///
    /// Any combination of the defined bits is valid; anything else is not.
    pub const fn check(byte: u8) -> Result<Self, LogLevelError> {
        match Self::from_bits(byte) {
            Some(level) => Ok(level),
            None => Err(LogLevelError::OutOfRange(byte)),
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return formatter.write_str("all");
        }
        if self.is_empty() {
            return formatter.write_str("none");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        formatter.write_str(&names.join("|").to_ascii_lowercase())
    }
}
