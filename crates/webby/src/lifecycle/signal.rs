use std::fmt;

/// Messages that wake the lifecycle loop out of its serving state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// An operating-system termination signal arrived.
    Terminate(i32),
    /// Tear down and load the configuration again.
    Reload,
    /// Tear down and exit.
    Stop,
}

impl LifecycleSignal {
    /// Returns `true` when the daemon should come back up after teardown.
    #[must_use]
    pub const fn restarts(self) -> bool {
        matches!(self, Self::Reload)
    }
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate(signal) => write!(formatter, "terminate({signal})"),
            Self::Reload => formatter.write_str("reload"),
            Self::Stop => formatter.write_str("stop"),
        }
    }
}
