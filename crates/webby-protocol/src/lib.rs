//! Wire types for the webby control channel.
//!
//! A control invocation talks to a running daemon over a local stream socket.
//! Each connection carries exactly one request, `<command name><argument>`,
//! and receives exactly one result byte before the daemon closes it. Framing
//! relies on the transport delivering the request as a single message, so no
//! length prefix is used: the receiver reads once, treats the final byte as
//! the argument, and everything before it as the command name.
//!
//! The result byte reserves bit 0 as a strict success/failure discriminator so
//! generic dispatch code never needs command-specific knowledge. The `status`
//! command layers a [`StatusSeverity`] on top of that bit.

mod command;
mod frame;
mod result;

pub use command::{Command, CommandArgument, UnknownCommand};
pub use frame::{FrameError, MAX_MESSAGE_BYTES, Request, decode_request, encode_request};
pub use result::{CommandResult, StatusSeverity};
