//! The daemon's log sink.
//!
//! A [`LogSink`] owns the two level masks (print and record) and the open log
//! file. It is created once per daemon process and handed to every component
//! that needs it; the tracing layers installed by [`crate::telemetry`] consult
//! it on every event, so level changes made by command handlers take effect
//! immediately.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::Level;

use webby_config::LogLevel;

/// Errors raised while opening or closing the log file.
#[derive(Debug, Error)]
pub enum LogSinkError {
    /// The log file could not be created.
    #[error("could not open '{path}' for logging: {source}")]
    Open {
        /// Log file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Flushing or syncing the log file failed.
    #[error("failed to flush log file: {0}")]
    Flush(#[source] io::Error),
}

/// Shared handle to the daemon's log destinations.
#[derive(Debug, Clone)]
pub struct LogSink {
    state: Arc<SinkState>,
}

#[derive(Debug)]
struct SinkState {
    print: AtomicU8,
    record: AtomicU8,
    file: Mutex<Option<BufWriter<File>>>,
}

impl LogSink {
    /// Creates a sink with the given levels and no log file.
    #[must_use]
    pub fn new(print: LogLevel, record: LogLevel) -> Self {
        Self {
            state: Arc::new(SinkState {
                print: AtomicU8::new(print.bits()),
                record: AtomicU8::new(record.bits()),
                file: Mutex::new(None),
            }),
        }
    }

    /// Level mask for messages printed to standard error.
    #[must_use]
    pub fn print_level(&self) -> LogLevel {
        LogLevel::from_bits_truncate(self.state.print.load(Ordering::SeqCst))
    }

    /// Level mask for messages recorded to the log file.
    #[must_use]
    pub fn record_level(&self) -> LogLevel {
        LogLevel::from_bits_truncate(self.state.record.load(Ordering::SeqCst))
    }

    /// Replaces the print level.
    pub fn set_print_level(&self, level: LogLevel) {
        self.state.print.store(level.bits(), Ordering::SeqCst);
    }

    /// Replaces the record level.
    pub fn set_record_level(&self, level: LogLevel) {
        self.state.record.store(level.bits(), Ordering::SeqCst);
    }

    /// Creates (or truncates) the log file and starts recording to it.
    pub fn open_file(&self, path: &Utf8Path) -> Result<(), LogSinkError> {
        let file = File::create(path).map_err(|source| LogSinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let previous = self.file().replace(BufWriter::new(file));
        if let Some(previous) = previous {
            finish(previous)?;
        }
        Ok(())
    }

    /// Flushes and closes the log file. Closing a sink without a file is a
    /// no-op.
    pub fn close(&self) -> Result<(), LogSinkError> {
        let current = self.file().take();
        match current {
            Some(writer) => finish(writer),
            None => Ok(()),
        }
    }

    /// Returns `true` while a log file is open.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.file().is_some()
    }

    pub(crate) fn prints(&self, level: &Level) -> bool {
        admits(self.print_level(), level)
    }

    pub(crate) fn records(&self, level: &Level) -> bool {
        admits(self.record_level(), level)
    }

    pub(crate) fn record_writer(&self) -> RecordWriter {
        RecordWriter {
            state: Arc::clone(&self.state),
        }
    }

    fn file(&self) -> MutexGuard<'_, Option<BufWriter<File>>> {
        self.state.file.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn finish(mut writer: BufWriter<File>) -> Result<(), LogSinkError> {
    writer.flush().map_err(LogSinkError::Flush)?;
    writer.get_ref().sync_all().map_err(LogSinkError::Flush)
}

fn admits(mask: LogLevel, level: &Level) -> bool {
    match *level {
        Level::ERROR => mask.contains(LogLevel::ERR),
        Level::WARN => mask.contains(LogLevel::WARN),
        Level::INFO => mask.contains(LogLevel::INFO),
        _ => false,
    }
}

/// Writer handed to the record layer; discards output while no file is open.
pub(crate) struct RecordWriter {
    state: Arc<SinkState>,
}

impl Write for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.state.file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.as_mut() {
            Some(writer) => {
                writer.write_all(buf)?;
                writer.flush()?;
                Ok(buf.len())
            }
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.state.file.lock().unwrap_or_else(PoisonError::into_inner);
        match file.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}
