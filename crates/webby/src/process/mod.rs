//! Process-level plumbing: launching the detached daemon, probing the
//! control socket and forwarding termination signals.

mod errors;
mod launch;
mod probe;
mod shutdown;

pub use self::errors::LaunchError;
pub use self::launch::{
    DaemonLaunch, MAX_SOCKET_CHECKS, SOCKET_CHECK_INTERVAL, start_forked_daemon, wait_for_socket,
};
pub use self::probe::socket_is_reachable;
pub use self::shutdown::{
    NoTerminationSignals, ShutdownError, SignalForwarder, SystemTerminationSignals,
    TerminationSignals,
};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
