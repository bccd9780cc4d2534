//! End-to-end suites driving a real lifecycle loop on background threads.

mod lifecycle_behaviour;
mod support;
