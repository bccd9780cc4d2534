//! The daemon's lifecycle phases.

use super::LifecycleSignal;

/// Phase of the lifecycle loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading options and building collaborators.
    Loading,
    /// Serving until a signal arrives.
    Serving,
    /// Tearing down before loading again.
    Reloading,
    /// Tearing down before exiting.
    Stopping,
}

impl Phase {
    /// Phase entered when `signal` arrives while serving.
    #[must_use]
    pub const fn after_signal(signal: LifecycleSignal) -> Self {
        if signal.restarts() {
            Self::Reloading
        } else {
            Self::Stopping
        }
    }

    /// Phase following a finished teardown, or `None` when the loop exits.
    #[must_use]
    pub const fn after_teardown(self) -> Option<Self> {
        match self {
            Self::Reloading => Some(Self::Loading),
            Self::Loading | Self::Serving | Self::Stopping => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LifecycleSignal::Reload, Phase::Reloading)]
    #[case(LifecycleSignal::Stop, Phase::Stopping)]
    #[case(LifecycleSignal::Terminate(15), Phase::Stopping)]
    #[case(LifecycleSignal::Terminate(2), Phase::Stopping)]
    fn signals_select_the_teardown_phase(
        #[case] signal: LifecycleSignal,
        #[case] expected: Phase,
    ) {
        assert_eq!(Phase::after_signal(signal), expected);
    }

    #[test]
    fn only_reloading_comes_back() {
        assert_eq!(Phase::Reloading.after_teardown(), Some(Phase::Loading));
        assert_eq!(Phase::Stopping.after_teardown(), None);
    }
}
