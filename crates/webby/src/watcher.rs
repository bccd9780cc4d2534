//! Polling change watcher.
//!
//! A watcher stats one path at a fixed interval and reports changes to a
//! callback. The callback decides whether watching continues: returning
//! `true` stops the watcher.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tracing::{debug, warn};

const WATCHER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watcher");

/// Interval used by the daemon's watchers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// What a poll observed.
#[derive(Debug)]
pub enum WatchEvent {
    /// The modification time changed, or the path reappeared.
    TimeModifiedChange,
    /// The size changed while the modification time did not.
    SizeChange,
    /// The very first stat failed.
    InitialReadError(io::Error),
    /// A later stat failed.
    ReadError(io::Error),
}

impl WatchEvent {
    /// Returns `true` for the two change events.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        matches!(self, Self::TimeModifiedChange | Self::SizeChange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observation {
    modified: Option<SystemTime>,
    size: u64,
}

/// Polling state for a single path.
#[derive(Debug)]
pub struct WatchTarget {
    path: PathBuf,
    observed: Option<Observation>,
    polled: bool,
    pending: Option<WatchEvent>,
}

impl WatchTarget {
    /// Starts watching `path`; nothing is read until the first poll.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observed: None,
            polled: false,
            pending: None,
        }
    }

    /// Starts watching `path` and records the baseline right away, so
    /// changes made before the first [`poll`](Self::poll) are reported by it.
    ///
    /// A failed baseline stat is reported as
    /// [`WatchEvent::InitialReadError`] by the first poll.
    #[must_use]
    pub fn observed(path: impl Into<PathBuf>) -> Self {
        let mut target = Self::new(path);
        target.pending = target.poll();
        target
    }

    /// Watched path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stats the path once and compares it with the previous poll.
    ///
    /// The first successful poll only records a baseline. A modification
    /// time change wins over a size change.
    pub fn poll(&mut self) -> Option<WatchEvent> {
        if let Some(event) = self.pending.take() {
            return Some(event);
        }
        let first = !self.polled;
        self.polled = true;
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(error) if first => return Some(WatchEvent::InitialReadError(error)),
            Err(error) => return Some(WatchEvent::ReadError(error)),
        };
        let current = Observation {
            modified: metadata.modified().ok(),
            size: metadata.len(),
        };
        match self.observed.replace(current) {
            None if first => None,
            None => Some(WatchEvent::TimeModifiedChange),
            Some(previous) if previous.modified != current.modified => {
                Some(WatchEvent::TimeModifiedChange)
            }
            Some(previous) if previous.size != current.size => Some(WatchEvent::SizeChange),
            Some(_) => None,
        }
    }
}

/// Errors raised when starting a watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to spawn watcher thread for '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to a background watcher.
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stops the watcher and waits for its thread.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: WATCHER_TARGET, "watcher thread panicked");
        }
    }

    /// Returns `true` once the watcher has stopped on its own.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Polls `path` every `interval` on a background thread, starting
/// immediately, and passes every event to `callback`.
pub fn watch<F>(
    path: impl Into<PathBuf>,
    interval: Duration,
    callback: F,
) -> Result<WatchHandle, WatchError>
where
    F: FnMut(WatchEvent) -> bool + Send + 'static,
{
    watch_target(WatchTarget::new(path), interval, callback)
}

/// Like [`watch`], but continues from an existing [`WatchTarget`] and its
/// baseline.
pub fn watch_target<F>(
    mut target: WatchTarget,
    interval: Duration,
    mut callback: F,
) -> Result<WatchHandle, WatchError>
where
    F: FnMut(WatchEvent) -> bool + Send + 'static,
{
    let path = target.path().to_path_buf();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let thread = thread::Builder::new()
        .name("webby-watcher".to_owned())
        .spawn(move || {
            debug!(target: WATCHER_TARGET, path = %target.path().display(), "watching");
            while !flag.load(Ordering::SeqCst) {
                if let Some(event) = target.poll()
                    && callback(event)
                {
                    break;
                }
                pause(interval, &flag);
            }
            debug!(target: WATCHER_TARGET, path = %target.path().display(), "watch ended");
        })
        .map_err(|source| WatchError::Spawn { path, source })?;
    Ok(WatchHandle {
        shutdown,
        thread: Some(thread),
    })
}

fn pause(interval: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        let now = Instant::now();
        if now >= deadline || shutdown.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
