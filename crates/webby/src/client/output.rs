use std::fmt;
use std::io::{self, Write};

/// Output handle abstracting over stdout/stderr writers.
pub struct ControlOutput<W: Write, E: Write> {
    pub stdout: W,
    pub stderr: E,
}

impl<W: Write, E: Write> ControlOutput<W, E> {
    pub fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    pub fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stdout.write_fmt(args)?;
        self.stdout.write_all(b"\n")?;
        self.stdout.flush()
    }

    pub fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.stderr.write_fmt(args)?;
        self.stderr.write_all(b"\n")?;
        self.stderr.flush()
    }
}
