//! Health probe behind the `status` command.

use std::fmt;
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use webby_protocol::StatusSeverity;

use crate::server::{RoutedPaths, request_path};

use super::HANDLER_TARGET;

/// What a single probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server answered with this status code.
    Status(u16),
    /// No response arrived.
    Unreachable,
}

/// Issues GET requests against the hosted paths.
pub trait PathProber: Send + Sync {
    /// Probes each path in order and returns one outcome per path.
    fn probe(&self, paths: &[String]) -> Vec<ProbeOutcome>;
}

/// Probes the local HTTP server over the loopback interface.
///
/// Redirects are not followed, so dead paths and other redirects count as
/// non-200 answers.
#[derive(Debug, Clone)]
pub struct HttpProber {
    base: String,
}

impl HttpProber {
    /// Targets `http://127.0.0.1:<port>`.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            base: format!("http://127.0.0.1:{port}"),
        }
    }
}

impl PathProber for HttpProber {
    fn probe(&self, paths: &[String]) -> Vec<ProbeOutcome> {
        let client = match Client::builder().redirect(Policy::none()).build() {
            Ok(client) => client,
            Err(error) => {
                warn!(target: HANDLER_TARGET, error = %error, "could not build probe client");
                return vec![ProbeOutcome::Unreachable; paths.len()];
            }
        };
        paths
            .iter()
            .map(|path| {
                let url = format!("{}{}", self.base, request_path(path));
                match client.get(&url).send() {
                    Ok(response) => ProbeOutcome::Status(response.status().as_u16()),
                    Err(error) => {
                        debug!(target: HANDLER_TARGET, url, error = %error, "probe failed");
                        ProbeOutcome::Unreachable
                    }
                }
            })
            .collect()
    }
}

/// Everything the `status` handler needs to probe the server.
#[derive(Clone)]
pub struct StatusProbe {
    prober: Arc<dyn PathProber>,
    routes: RoutedPaths,
}

impl StatusProbe {
    /// Pairs a prober with the server's current route list.
    #[must_use]
    pub fn new(prober: Arc<dyn PathProber>, routes: RoutedPaths) -> Self {
        Self { prober, routes }
    }

    /// Probes every hosted path and classifies the results.
    #[must_use]
    pub fn run(&self) -> StatusSeverity {
        let paths = self.routes.snapshot();
        classify(self.prober.probe(&paths))
    }
}

impl fmt::Debug for StatusProbe {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StatusProbe")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// Folds probe outcomes into a severity.
///
/// A 4xx/5xx answer or an unreachable path is a failure; any other non-200
/// answer only downgrades the result to [`StatusSeverity::HttpNon2xx`]. No
/// paths at all is healthy.
pub fn classify<I>(outcomes: I) -> StatusSeverity
where
    I: IntoIterator<Item = ProbeOutcome>,
{
    let mut total = 0_usize;
    let mut ok = 0_usize;
    let mut failed = 0_usize;
    for outcome in outcomes {
        total += 1;
        match outcome {
            ProbeOutcome::Status(200) => ok += 1,
            ProbeOutcome::Status(code) if code >= 400 => failed += 1,
            ProbeOutcome::Status(_) => {}
            ProbeOutcome::Unreachable => failed += 1,
        }
    }

    if failed == 0 {
        if ok == total {
            StatusSeverity::Ok
        } else {
            StatusSeverity::HttpNon2xx
        }
    } else if failed == total {
        StatusSeverity::HttpFail
    } else {
        StatusSeverity::HttpPartialFail
    }
}
