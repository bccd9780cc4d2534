//! Connection handling for the command listener.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use webby_protocol::{CommandResult, MAX_MESSAGE_BYTES, decode_request};

use crate::handlers::CommandTable;

use super::LISTENER_TARGET;

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: UnixStream);
}

/// Reads one request, dispatches it through the handler table and answers
/// with exactly one result byte.
pub struct DispatchConnectionHandler {
    table: CommandTable,
}

impl DispatchConnectionHandler {
    /// Wraps the handler table.
    #[must_use]
    pub fn new(table: CommandTable) -> Self {
        Self { table }
    }

    fn dispatch(&self, message: &[u8]) -> CommandResult {
        let request = match decode_request(message) {
            Ok(request) => request,
            Err(error) => {
                warn!(target: LISTENER_TARGET, error = %error, "rejected control message");
                return CommandResult::FAILURE;
            }
        };
        let command = match request.command() {
            Ok(command) => command,
            Err(error) => {
                warn!(target: LISTENER_TARGET, error = %error, "rejected control message");
                return CommandResult::FAILURE;
            }
        };
        let Some(callback) = self.table.get(command) else {
            warn!(
                target: LISTENER_TARGET,
                command = %command,
                "no handler registered for command"
            );
            return CommandResult::FAILURE;
        };

        debug!(
            target: LISTENER_TARGET,
            command = %command,
            argument = %request.argument(),
            "dispatching control command"
        );
        let argument = request.argument();
        panic::catch_unwind(AssertUnwindSafe(|| callback(argument))).unwrap_or_else(|_| {
            warn!(target: LISTENER_TARGET, command = %command, "command handler panicked");
            CommandResult::FAILURE
        })
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, mut stream: UnixStream) {
        let result = match read_message(&mut stream) {
            Ok(message) => self.dispatch(&message),
            Err(error) => {
                warn!(target: LISTENER_TARGET, error = %error, "failed to read control message");
                CommandResult::FAILURE
            }
        };

        if let Err(error) = stream
            .write_all(&[result.byte()])
            .and_then(|()| stream.flush())
        {
            warn!(target: LISTENER_TARGET, error = %error, "failed to write command result");
        }
    }
}

/// Reads a single message of at most [`MAX_MESSAGE_BYTES`].
///
/// One read is one message; the framing carries no delimiter or length.
fn read_message(stream: &mut UnixStream) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0_u8; MAX_MESSAGE_BYTES];
    let read = loop {
        match stream.read(&mut buffer) {
            Ok(read) => break read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    };
    buffer.truncate(read);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::thread;

    use webby_protocol::{Command, CommandArgument, encode_request};

    #[fixture]
    fn last_argument() -> Arc<AtomicU8> {
        Arc::new(AtomicU8::new(u8::MAX))
    }

    fn table_recording(last_argument: &Arc<AtomicU8>) -> CommandTable {
        let seen = Arc::clone(last_argument);
        CommandTable::new().with(Command::SetLogPrintLevel, move |argument| {
            seen.store(argument.byte(), Ordering::SeqCst);
            CommandResult::SUCCESS
        })
    }

    fn round_trip(handler: DispatchConnectionHandler, message: &[u8]) -> Vec<u8> {
        let (mut client, server) = UnixStream::pair().expect("socket pair");
        let worker = thread::spawn(move || handler.handle(server));
        client.write_all(message).expect("write message");
        client
            .shutdown(std::net::Shutdown::Write)
            .expect("shutdown write half");
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).expect("read reply");
        worker.join().expect("join handler");
        reply
    }

    #[rstest]
    fn registered_command_receives_its_argument(last_argument: Arc<AtomicU8>) {
        let handler = DispatchConnectionHandler::new(table_recording(&last_argument));
        let message = encode_request(Command::SetLogPrintLevel, CommandArgument::new(3));

        let reply = round_trip(handler, &message);

        assert_eq!(reply, vec![CommandResult::SUCCESS.byte()]);
        assert_eq!(last_argument.load(Ordering::SeqCst), 3);
    }

    #[rstest]
    #[case::unknown_name(b"bogus\x00".as_slice())]
    #[case::unregistered(b"reload\x00".as_slice())]
    #[case::empty_name(b"\x00".as_slice())]
    #[case::empty_message(b"".as_slice())]
    fn rejected_messages_answer_failure(last_argument: Arc<AtomicU8>, #[case] message: &[u8]) {
        let handler = DispatchConnectionHandler::new(table_recording(&last_argument));

        let reply = round_trip(handler, message);

        assert_eq!(reply, vec![CommandResult::FAILURE.byte()]);
        assert_eq!(last_argument.load(Ordering::SeqCst), u8::MAX);
    }

    #[test]
    fn panicking_handler_still_answers() {
        let table = CommandTable::new().with(Command::Restart, |_| panic!("handler exploded"));
        let handler = DispatchConnectionHandler::new(table);

        let reply = round_trip(handler, &encode_request(Command::Restart, CommandArgument::NONE));

        assert_eq!(reply, vec![CommandResult::FAILURE.byte()]);
    }

    #[test]
    fn status_results_pass_through_unchanged() {
        let table = CommandTable::new().with(Command::Status, |_| CommandResult::from_byte(0x05));
        let handler = DispatchConnectionHandler::new(table);

        let reply = round_trip(handler, &encode_request(Command::Status, CommandArgument::NONE));

        assert_eq!(reply, vec![0x05]);
    }
}
