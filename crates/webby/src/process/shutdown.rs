//! Forwards operating-system termination signals to the lifecycle loop.

use std::io;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{info, warn};

use crate::lifecycle::LifecycleSignal;

use super::PROCESS_TARGET;

/// Abstraction over termination notification mechanisms.
pub trait TerminationSignals: Send + Sync {
    /// Starts forwarding termination signals into `sink` until the returned
    /// forwarder is closed.
    fn forward(&self, sink: Sender<LifecycleSignal>) -> Result<SignalForwarder, ShutdownError>;
}

/// Errors reported by signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Listens for `SIGTERM`, `SIGINT` and `SIGQUIT`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTerminationSignals;

impl TerminationSignals for SystemTerminationSignals {
    fn forward(&self, sink: Sender<LifecycleSignal>) -> Result<SignalForwarder, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("webby-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    info!(target: PROCESS_TARGET, signal, "termination signal received");
                    if sink.send(LifecycleSignal::Terminate(signal)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|source| {
                handle.close();
                ShutdownError::Install { source }
            })?;
        Ok(SignalForwarder {
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}

/// Never forwards anything. Used when the embedding process owns signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTerminationSignals;

impl TerminationSignals for NoTerminationSignals {
    fn forward(&self, _sink: Sender<LifecycleSignal>) -> Result<SignalForwarder, ShutdownError> {
        Ok(SignalForwarder::inert())
    }
}

/// Running signal forwarder; closing it unregisters the handlers.
#[derive(Debug)]
pub struct SignalForwarder {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl SignalForwarder {
    /// A forwarder with nothing behind it.
    #[must_use]
    pub const fn inert() -> Self {
        Self {
            handle: None,
            thread: None,
        }
    }

    /// Stops forwarding and waits for the forwarding thread.
    pub fn close(mut self) {
        self.shut();
    }

    fn shut(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: PROCESS_TARGET, "signal forwarding thread panicked");
        }
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.shut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn inert_forwarder_posts_nothing() {
        let (sink, signals) = mpsc::channel();
        let forwarder = NoTerminationSignals.forward(sink).expect("forward");
        forwarder.close();
        assert!(signals.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn system_forwarder_closes_cleanly() {
        let (sink, _signals) = mpsc::channel();
        let forwarder = SystemTerminationSignals.forward(sink).expect("forward");
        forwarder.close();
    }
}
