//! Listener implementation for the control socket.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);

/// Listener bound to the daemon's Unix domain socket.
#[derive(Debug)]
pub struct CommandListener {
    path: Utf8PathBuf,
    listener: UnixListener,
}

impl CommandListener {
    /// Binds the socket at `path`, replacing a stale socket file left behind
    /// by a previous process.
    ///
    /// Fails with [`ListenerError::InUse`] when another process still answers
    /// on the socket.
    pub fn bind(path: &Utf8Path) -> Result<Self, ListenerError> {
        let listener = bind_unix(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            listener,
        })
    }

    /// Socket path the listener is bound to.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Starts accepting connections on a background thread.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_unix_socket(&self.path);
            return Err(ListenerError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let path = self.path.clone();
        let handle = thread::Builder::new()
            .name("webby-listener".to_owned())
            .spawn(move || self.listen(&handler, &shutdown_flag))
            .map_err(|source| {
                cleanup_unix_socket(&path);
                ListenerError::Spawn { source }
            })?;
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Accepts connections until `shutdown` is raised or accepting fails.
    ///
    /// Every accepted connection is served on its own thread. On shutdown
    /// the socket file is removed first, connections already queued on the
    /// listener are still served, and the listener is closed before the loop
    /// waits for every connection thread to finish.
    pub fn listen(
        self,
        handler: &Arc<dyn ConnectionHandler>,
        shutdown: &AtomicBool,
    ) -> Result<(), ListenerError> {
        let Self { path, listener } = self;
        info!(target: LISTENER_TARGET, path = %path, "control socket listening");
        let mut connections: Vec<JoinHandle<()>> = Vec::new();
        let outcome = loop {
            if shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }
            match listener.accept() {
                Ok((stream, _)) => {
                    connections.retain(|connection| !connection.is_finished());
                    connections.extend(serve_connection(stream, handler));
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(source) => break Err(ListenerError::Accept { source }),
            }
        };

        cleanup_unix_socket(&path);
        if outcome.is_ok() {
            accept_backlog(&listener, handler, &mut connections);
        }
        drop(listener);

        debug!(
            target: LISTENER_TARGET,
            pending = connections.len(),
            "draining control connections"
        );
        for connection in connections {
            if connection.join().is_err() {
                warn!(target: LISTENER_TARGET, "control connection thread panicked");
            }
        }
        info!(target: LISTENER_TARGET, path = %path, "control socket closed");
        outcome
    }
}

/// Serves connections that queued up before the socket file was removed.
fn accept_backlog(
    listener: &UnixListener,
    handler: &Arc<dyn ConnectionHandler>,
    connections: &mut Vec<JoinHandle<()>>,
) {
    loop {
        match listener.accept() {
            Ok((stream, _)) => connections.extend(serve_connection(stream, handler)),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }
}

fn serve_connection(
    stream: UnixStream,
    handler: &Arc<dyn ConnectionHandler>,
) -> Option<JoinHandle<()>> {
    if let Err(error) = stream.set_nonblocking(false) {
        warn!(target: LISTENER_TARGET, error = %error, "failed to make connection blocking");
    }
    let handler = Arc::clone(handler);
    match thread::Builder::new()
        .name("webby-command".to_owned())
        .spawn(move || handler.handle(stream))
    {
        Ok(connection) => Some(connection),
        Err(error) => {
            warn!(target: LISTENER_TARGET, error = %error, "failed to spawn connection thread");
            None
        }
    }
}

/// Handle to the background listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), ListenerError>>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop without waiting for it.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the accept loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops accepting, waits for in-flight connections and returns the
    /// accept loop's outcome.
    pub fn close(self) -> Result<(), ListenerError> {
        self.shutdown();
        self.join()
    }

    /// Waits for the accept loop to exit.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic)?,
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn bind_unix(path: &Utf8Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| ListenerError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::NotSocket {
                path: path.to_path_buf(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::InUse {
                    path: path.to_path_buf(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                debug!(target: LISTENER_TARGET, path = %path, "removing stale control socket");
                fs::remove_file(path).map_err(|source| ListenerError::Cleanup {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::Connect {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        path: path.to_path_buf(),
        source,
    })
}

fn cleanup_unix_socket(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
