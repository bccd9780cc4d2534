//! Entry point for the `webby` binary.
//!
//! Delegates to [`webby::run`]. The standard streams are passed unlocked:
//! in daemon mode the call does not return until the daemon stops, and the
//! log layers write to standard error from other threads meanwhile.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    webby::run(std::env::args_os(), &mut stdout, &mut stderr)
}
