//! Maps request paths onto the content root.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tracing::warn;

use super::SERVER_TARGET;

const INDEX_FILE: &str = "index.html";

/// Bytes that cannot appear verbatim in the path of a request URL.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How a request path is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Redirect the client back onto itself.
    Dead,
    /// Serve this file.
    File(&'a Utf8Path),
    /// Nothing is hosted here.
    NotFound,
}

/// Snapshot of the files hosted under a content root.
///
/// Every regular file is reachable at `/<relative path>`. A directory that
/// contains `index.html` is reachable at both `/<relative path>/` and
/// `/<relative path>`.
#[derive(Debug, Default)]
pub struct SiteMap {
    files: HashMap<String, Utf8PathBuf>,
    dead: HashSet<String>,
    routed: Vec<String>,
}

impl SiteMap {
    /// Walks `root` and records every hosted path.
    ///
    /// Entries that cannot be read are logged and skipped.
    #[must_use]
    pub fn scan(root: &Utf8Path, dead_paths: &[String]) -> Self {
        let mut site = Self::default();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(true)
            .build();
        for entry in walker {
            match entry {
                Ok(entry) => site.record(root, entry.path()),
                Err(error) => {
                    warn!(target: SERVER_TARGET, error = %error, "skipping unreadable site entry");
                }
            }
        }
        for path in dead_paths {
            site.dead.insert(normalise(path));
        }
        site.routed.sort();
        site
    }

    fn record(&mut self, root: &Utf8Path, path: &std::path::Path) {
        let Some(path) = Utf8Path::from_path(path) else {
            warn!(target: SERVER_TARGET, path = %path.display(), "skipping non UTF-8 path");
            return;
        };
        let Ok(relative) = path.strip_prefix(root) else {
            return;
        };
        let relative = relative
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");

        if path.is_dir() {
            let index = path.join(INDEX_FILE);
            if !index.is_file() {
                return;
            }
            if relative.is_empty() {
                self.files.insert("/".to_owned(), index);
                self.routed.push("/".to_owned());
            } else {
                self.files.insert(format!("/{relative}/"), index.clone());
                self.files.insert(format!("/{relative}"), index);
                self.routed.push(format!("/{relative}/"));
            }
        } else if path.is_file() {
            let uri = format!("/{relative}");
            if uri.contains("..") {
                warn!(target: SERVER_TARGET, path = %uri, "hosted path contains '..'");
            }
            self.files.insert(uri.clone(), path.to_path_buf());
            self.routed.push(uri);
        }
    }

    /// Decides how to answer a request for `request_path`, which may still
    /// be percent-encoded. Dead paths win over hosted files.
    #[must_use]
    pub fn resolve(&self, request_path: &str) -> Route<'_> {
        let path = percent_decode_str(request_path).decode_utf8_lossy();
        if self.dead.contains(path.as_ref()) {
            return Route::Dead;
        }
        self.files
            .get(path.as_ref())
            .map_or(Route::NotFound, |file| Route::File(file))
    }

    /// Hosted paths probed by the `status` command, sorted.
    #[must_use]
    pub fn routed_paths(&self) -> &[String] {
        &self.routed
    }
}

/// Percent-encodes a hosted path so it can be requested over HTTP.
#[must_use]
pub fn request_path(route: &str) -> String {
    utf8_percent_encode(route, PATH_ESCAPES).to_string()
}

fn normalise(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

/// Route list shared between the server thread and the `status` handler.
///
/// The server publishes a fresh list whenever it rebuilds; readers take a
/// cheap snapshot and never hold the lock while probing.
#[derive(Debug, Clone, Default)]
pub struct RoutedPaths(Arc<RwLock<Arc<[String]>>>);

impl RoutedPaths {
    /// Starts with `paths`.
    #[must_use]
    pub fn new(paths: Vec<String>) -> Self {
        Self(Arc::new(RwLock::new(paths.into())))
    }

    /// Current route list.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[String]> {
        Arc::clone(&self.0.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the route list.
    pub fn publish(&self, paths: Vec<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = paths.into();
    }
}
