//! The one-byte command result.

use std::fmt;

const FAILURE_BIT: u8 = 0b0000_0001;
const SEVERITY_MASK: u8 = 0b0000_0110;
const SEVERITY_SHIFT: u8 = 1;

/// Byte returned to the client once a command has been dispatched.
///
/// Bit 0 is always the success (`0`) / failure (`1`) discriminator. Bits 1-2
/// carry a [`StatusSeverity`] for the `status` command and are zero for every
/// other command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandResult(u8);

impl CommandResult {
    /// Plain success.
    pub const SUCCESS: Self = Self(0);
    /// Plain failure.
    pub const FAILURE: Self = Self(FAILURE_BIT);

    /// Wraps a byte read from the wire.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the byte to write to the wire.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self.0
    }

    /// Maps a boolean outcome to a plain result.
    #[must_use]
    pub const fn from_outcome(succeeded: bool) -> Self {
        if succeeded { Self::SUCCESS } else { Self::FAILURE }
    }

    /// Returns `true` when the discriminator bit reports success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 & FAILURE_BIT == 0
    }

    /// Encodes a status severity, keeping the discriminator consistent with
    /// [`StatusSeverity::is_failure`].
    #[must_use]
    pub const fn from_status(severity: StatusSeverity) -> Self {
        let discriminator = if severity.is_failure() { FAILURE_BIT } else { 0 };
        Self(((severity as u8) << SEVERITY_SHIFT) | discriminator)
    }

    /// Decodes a status severity.
    ///
    /// Returns `None` when the byte is not a well-formed status result, for
    /// example the plain [`CommandResult::FAILURE`] the daemon sends when the
    /// command could not be dispatched at all.
    #[must_use]
    pub fn status(self) -> Option<StatusSeverity> {
        if self.0 & !(SEVERITY_MASK | FAILURE_BIT) != 0 {
            return None;
        }
        let severity = StatusSeverity::from_index((self.0 & SEVERITY_MASK) >> SEVERITY_SHIFT)?;
        (Self::from_status(severity) == self).then_some(severity)
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.is_success() { "success" } else { "failure" };
        write!(formatter, "{outcome} ({:#04x})", self.0)
    }
}

/// Aggregate outcome of probing every routed path, in increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusSeverity {
    /// Every path answered `200`.
    Ok = 0,
    /// Every path answered below `400`, but not all with `200`.
    HttpNon2xx = 1,
    /// Some, but not all, paths failed.
    HttpPartialFail = 2,
    /// Every path failed.
    HttpFail = 3,
}

impl StatusSeverity {
    const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Ok),
            1 => Some(Self::HttpNon2xx),
            2 => Some(Self::HttpPartialFail),
            3 => Some(Self::HttpFail),
            _ => None,
        }
    }

    /// Severities at or above a partial failure clear the success bit.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::HttpPartialFail | Self::HttpFail)
    }
}

impl fmt::Display for StatusSeverity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Ok => "OK",
            Self::HttpNon2xx => "Non 200",
            Self::HttpPartialFail => "Partial Fail",
            Self::HttpFail => "Fail",
        })
    }
}
