//! Single-read request framing.

use std::borrow::Cow;

use thiserror::Error;

use crate::command::{Command, CommandArgument, UnknownCommand};

/// Largest request the daemon reads from a connection.
///
/// Comfortably exceeds the longest command name plus its argument byte.
pub const MAX_MESSAGE_BYTES: usize = 526;

/// A request split into its raw name and argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    name: &'a [u8],
    argument: CommandArgument,
}

impl<'a> Request<'a> {
    /// Raw command name bytes. May be empty.
    #[must_use]
    pub const fn name(&self) -> &'a [u8] {
        self.name
    }

    /// Lossy textual rendering of the name, for diagnostics.
    #[must_use]
    pub fn name_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.name)
    }

    /// Argument byte that accompanied the name.
    #[must_use]
    pub const fn argument(&self) -> CommandArgument {
        self.argument
    }

    /// Resolves the name into a known command.
    pub fn command(&self) -> Result<Command, UnknownCommand> {
        Command::from_wire(self.name)
    }
}

/// Errors raised while splitting a request message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The peer sent nothing before closing its side.
    #[error("request was empty")]
    Empty,
    /// The message exceeded [`MAX_MESSAGE_BYTES`].
    #[error("request of {length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit")]
    Oversized {
        /// Received message length.
        length: usize,
    },
}

/// Serialises a command and its argument as one message.
#[must_use]
pub fn encode_request(command: Command, argument: CommandArgument) -> Vec<u8> {
    let name = command.wire_name().as_bytes();
    let mut message = Vec::with_capacity(name.len() + 1);
    message.extend_from_slice(name);
    message.push(argument.byte());
    message
}

/// Splits a received message into name and argument.
///
/// A one-byte message is legal and yields an empty name, which later fails
/// command resolution rather than framing.
pub fn decode_request(message: &[u8]) -> Result<Request<'_>, FrameError> {
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(FrameError::Oversized {
            length: message.len(),
        });
    }
    let (argument, name) = message.split_last().ok_or(FrameError::Empty)?;
    Ok(Request {
        name,
        argument: CommandArgument::new(*argument),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_request_is_name_then_argument() {
        let message = encode_request(Command::SetLogRecordLevel, CommandArgument::new(3));
        assert_eq!(message, b"log-record\x03");

        let request = decode_request(&message).expect("decode request");
        assert_eq!(request.command(), Ok(Command::SetLogRecordLevel));
        assert_eq!(request.argument().byte(), 3);
    }

    #[test]
    fn single_byte_message_has_empty_name() {
        let request = decode_request(&[7]).expect("decode request");
        assert!(request.name().is_empty());
        assert_eq!(request.argument().byte(), 7);
        assert!(request.command().is_err());
    }

    #[test]
    fn empty_message_is_rejected() {
        assert_eq!(decode_request(&[]), Err(FrameError::Empty));
    }

    #[test]
    fn oversized_message_is_rejected() {
        let message = vec![b'a'; MAX_MESSAGE_BYTES + 1];
        assert_eq!(
            decode_request(&message),
            Err(FrameError::Oversized {
                length: MAX_MESSAGE_BYTES + 1
            })
        );
    }
}
