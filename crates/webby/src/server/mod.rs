//! The HTTP server collaborator.
//!
//! [`HttpServer::new`] validates the options and scans the content root;
//! [`HttpServer::start_threaded`] binds the HTTP port, and the HTTPS port
//! when a certificate and key are configured, and runs the server on a
//! dedicated thread that owns its own async runtime. The thread is driven by
//! [`ServerCommand`] messages: a restart rebuilds the server from the same
//! options, and a shutoff stops it gracefully.

mod errors;
mod http;
mod site;
mod tls;

use std::fs;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle as TaskHandle;
use tracing::{error, info, warn};

use webby_config::ServerOptions;

use crate::lifecycle::LifecycleSignal;

pub use self::errors::ServerError;
pub use self::site::{Route, RoutedPaths, SiteMap, request_path};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Messages understood by the server thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    /// Stop serving and exit the thread.
    Shutoff,
    /// Close the listener and rebuild from the current options.
    Restart,
}

/// A validated server, ready to start.
#[derive(Debug)]
pub struct HttpServer {
    options: ServerOptions,
    site: Arc<SiteMap>,
}

impl HttpServer {
    /// Checks the content root and TLS files, then scans the site.
    pub fn new(options: &ServerOptions) -> Result<Self, ServerError> {
        let root = options.site_root();
        let metadata = fs::metadata(root).map_err(|source| ServerError::SiteRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ServerError::NotDirectory {
                path: root.to_path_buf(),
            });
        }
        if let Some((cert, key)) = options.tls_paths() {
            for path in [cert, key] {
                fs::metadata(path).map_err(|source| ServerError::Tls {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }

        let site = SiteMap::scan(root, &options.dead_paths);
        info!(
            target: SERVER_TARGET,
            root = %root,
            paths = site.routed_paths().len(),
            "site scanned"
        );
        Ok(Self {
            options: options.clone(),
            site: Arc::new(site),
        })
    }

    /// Paths currently hosted.
    #[must_use]
    pub fn routed_paths(&self) -> &[String] {
        self.site.routed_paths()
    }

    /// Binds the configured ports and serves on a background thread.
    ///
    /// `routes` receives the new path list after every successful restart.
    /// If a restart fails, the thread logs the error, posts
    /// [`LifecycleSignal::Stop`] to `faults` and exits.
    pub fn start_threaded(
        self,
        routes: RoutedPaths,
        faults: Sender<LifecycleSignal>,
    ) -> Result<ServerHandle, ServerError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("webby-http-worker")
            .enable_all()
            .build()
            .map_err(|source| ServerError::Runtime { source })?;
        let listeners = Listeners::bind(&self.options, &runtime)?;
        let local_addr = listeners.http_addr(self.options.http_port())?;
        let tls_addr = listeners.https_addr(self.options.https_port())?;
        let (commands, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("webby-http".to_owned())
            .spawn(move || {
                ServerThread {
                    runtime,
                    receiver,
                    routes,
                    faults,
                }
                .run(self, listeners);
            })
            .map_err(|source| ServerError::Spawn { source })?;
        info!(target: SERVER_TARGET, addr = %local_addr, "HTTP server listening");
        if let Some(addr) = tls_addr {
            info!(target: SERVER_TARGET, addr = %addr, "HTTPS server listening");
        }
        Ok(ServerHandle {
            commands,
            local_addr,
            tls_addr,
            thread: Some(thread),
        })
    }
}

fn unspecified(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = unspecified(port);
    let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind { addr, source })?;
    Ok(listener)
}

/// Sockets served by one server generation.
struct Listeners {
    http: TcpListener,
    https: Option<(TcpListener, RustlsConfig)>,
}

impl Listeners {
    fn bind(options: &ServerOptions, runtime: &Runtime) -> Result<Self, ServerError> {
        let http = bind(options.http_port())?;
        let https = match options.tls_paths() {
            Some((cert, key)) => {
                let config = tls::load_config(runtime, cert, key)?;
                Some((bind(options.https_port())?, config))
            }
            None => None,
        };
        Ok(Self { http, https })
    }

    fn http_addr(&self, port: u16) -> Result<SocketAddr, ServerError> {
        self.http.local_addr().map_err(|source| ServerError::Bind {
            addr: unspecified(port),
            source,
        })
    }

    fn https_addr(&self, port: u16) -> Result<Option<SocketAddr>, ServerError> {
        self.https
            .as_ref()
            .map(|(listener, _)| {
                listener.local_addr().map_err(|source| ServerError::Bind {
                    addr: unspecified(port),
                    source,
                })
            })
            .transpose()
    }
}

struct ServerThread {
    runtime: Runtime,
    receiver: Receiver<ServerCommand>,
    routes: RoutedPaths,
    faults: Sender<LifecycleSignal>,
}

impl ServerThread {
    fn run(self, mut server: HttpServer, mut listeners: Listeners) {
        loop {
            let command = self.serve_until_command(&server, listeners);
            match command {
                ServerCommand::Shutoff => {
                    info!(target: SERVER_TARGET, "HTTP server stopped");
                    return;
                }
                ServerCommand::Restart => {
                    info!(target: SERVER_TARGET, "HTTP server restarting");
                    match self.rebuild(&server.options) {
                        Ok((rebuilt, rebound)) => {
                            self.routes.publish(rebuilt.routed_paths().to_vec());
                            server = rebuilt;
                            listeners = rebound;
                        }
                        Err(error) => {
                            error!(
                                target: SERVER_TARGET,
                                error = %error,
                                "could not rebuild HTTP server"
                            );
                            if self.faults.send(LifecycleSignal::Stop).is_err() {
                                warn!(target: SERVER_TARGET, "lifecycle loop is not listening");
                            }
                            return;
                        }
                    }
                }
            }
        }
    }

    fn rebuild(&self, options: &ServerOptions) -> Result<(HttpServer, Listeners), ServerError> {
        let server = HttpServer::new(options)?;
        let listeners = Listeners::bind(options, &self.runtime)?;
        Ok((server, listeners))
    }

    /// Serves until a command arrives, then stops both listeners gracefully.
    fn serve_until_command(&self, server: &HttpServer, listeners: Listeners) -> ServerCommand {
        let app = http::router(Arc::clone(&server.site));
        let tls = listeners
            .https
            .map(|(listener, config)| self.serve_https(app.clone(), listener, config));

        let (stop, stopped) = oneshot::channel::<()>();
        let http = listeners.http;
        let task = self.runtime.spawn(async move {
            let listener = tokio::net::TcpListener::from_std(http)?;
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                // A dropped sender also means stop.
                stopped.await.ok();
            })
            .await
        });

        let command = self.receiver.recv().unwrap_or(ServerCommand::Shutoff);
        if stop.send(()).is_err() {
            warn!(target: SERVER_TARGET, "HTTP server exited before it was asked to stop");
        }
        if let Some((handle, _)) = &tls {
            handle.graceful_shutdown(None);
        }
        self.finish(task, "HTTP");
        if let Some((_, task)) = tls {
            self.finish(task, "HTTPS");
        }
        command
    }

    fn serve_https(
        &self,
        app: Router,
        listener: TcpListener,
        config: RustlsConfig,
    ) -> (axum_server::Handle, TaskHandle<io::Result<()>>) {
        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        let task = self.runtime.spawn(async move {
            axum_server::from_tcp_rustls(listener, config)
                .handle(shutdown)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await
        });
        (handle, task)
    }

    fn finish(&self, task: TaskHandle<io::Result<()>>, scheme: &str) {
        match self.runtime.block_on(task) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                error!(target: SERVER_TARGET, error = %error, scheme, "server failed");
            }
            Err(error) => {
                error!(target: SERVER_TARGET, error = %error, scheme, "server task aborted");
            }
        }
    }
}

/// Handle to a running server thread.
#[derive(Debug)]
pub struct ServerHandle {
    commands: Sender<ServerCommand>,
    local_addr: SocketAddr,
    tls_addr: Option<SocketAddr>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Sender for posting commands to the server thread.
    #[must_use]
    pub fn commands(&self) -> Sender<ServerCommand> {
        self.commands.clone()
    }

    /// Address the server was first bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address the HTTPS listener was first bound to, if TLS is configured.
    #[must_use]
    pub const fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls_addr
    }

    /// Shuts the server off and waits for its thread to exit.
    pub fn stop(mut self) -> Result<(), ServerError> {
        // The thread may already be gone after a failed restart.
        self.commands.send(ServerCommand::Shutoff).ok();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ServerError::ThreadPanic),
            None => Ok(()),
        }
    }
}
