//! Control-socket transport.
//!
//! The transport module binds the daemon's Unix domain socket and accepts
//! connections in a background thread, handing each one to a
//! [`ConnectionHandler`] on its own thread.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, DispatchConnectionHandler};
pub use self::listener::{CommandListener, ListenerHandle};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, exchange, wait_for_count};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
