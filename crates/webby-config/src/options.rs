//! The daemon's options document.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT, DEFAULT_LOG_PATH, DEFAULT_SITE_PATH};
use crate::level::{LogLevel, LogLevelError};

/// Options controlling the HTTP server and the daemon's log sink.
///
/// Keys are written in PascalCase. Every key is optional; missing keys take
/// their value from [`ServerOptions::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerOptions {
    /// Root of the website to host. Empty selects [`DEFAULT_SITE_PATH`].
    pub site: Utf8PathBuf,
    /// TLS certificate. Empty disables HTTPS.
    pub cert: Utf8PathBuf,
    /// TLS private key. Empty disables HTTPS.
    pub key: Utf8PathBuf,
    /// Port to serve on; zero or negative selects [`DEFAULT_HTTP_PORT`].
    pub port: i32,
    /// Port to serve HTTPS on when TLS is configured; zero or negative
    /// selects [`DEFAULT_HTTPS_PORT`].
    pub tls_port: i32,
    /// Log file. Empty disables recording to file.
    pub log: Utf8PathBuf,
    /// Level text for messages printed to standard error.
    pub log_level_print: String,
    /// Level text for messages recorded to the log file.
    pub log_level_record: String,
    /// Watch the configuration and content root and reload on change.
    pub auto_reload: bool,
    /// Paths answered with a redirect back onto the requesting client.
    pub dead_paths: Vec<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            site: Utf8PathBuf::from(DEFAULT_SITE_PATH),
            cert: Utf8PathBuf::new(),
            key: Utf8PathBuf::new(),
            port: -1,
            tls_port: -1,
            log: Utf8PathBuf::from(DEFAULT_LOG_PATH),
            log_level_print: "all".to_owned(),
            log_level_record: "all".to_owned(),
            auto_reload: true,
            dead_paths: Vec::new(),
        }
    }
}

/// Errors describing why options could not be loaded or written.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The options file could not be inspected.
    #[error("could not stat config at '{path}': {source}")]
    Stat {
        /// Options file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The options file could not be read.
    #[error("could not read config at '{path}': {source}")]
    Read {
        /// Options file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The options file was not valid JSON for [`ServerOptions`].
    #[error("could not parse config JSON at '{path}': {source}")]
    Parse {
        /// Options file path.
        path: Utf8PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// Serialising the options failed.
    #[error("could not serialise config: {0}")]
    Serialise(#[source] serde_json::Error),
    /// Writing the options file failed.
    #[error("could not write config to '{path}': {source}")]
    Write {
        /// Options file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Loads options from `path`.
///
/// Never fails: on any error the defaults are returned together with the
/// diagnostic explaining why.
#[must_use]
pub fn load_options(path: &Utf8Path) -> (ServerOptions, Option<ConfigError>) {
    match try_load(path) {
        Ok(options) => (options, None),
        Err(error) => (ServerOptions::default(), Some(error)),
    }
}

fn try_load(path: &Utf8Path) -> Result<ServerOptions, ConfigError> {
    fs::metadata(path).map_err(|source| ConfigError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl ServerOptions {
    /// Writes the options as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn write_to_path(&self, path: &Utf8Path) -> Result<(), ConfigError> {
        let mut document = serde_json::to_vec_pretty(self).map_err(ConfigError::Serialise)?;
        document.push(b'\n');
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, document).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Content root to serve.
    #[must_use]
    pub fn site_root(&self) -> &Utf8Path {
        if self.site.as_str().is_empty() {
            Utf8Path::new(DEFAULT_SITE_PATH)
        } else {
            &self.site
        }
    }

    /// Port to bind the HTTP listener to.
    #[must_use]
    pub fn http_port(&self) -> u16 {
        positive_port(self.port).unwrap_or(DEFAULT_HTTP_PORT)
    }

    /// Port to bind the HTTPS listener to.
    #[must_use]
    pub fn https_port(&self) -> u16 {
        positive_port(self.tls_port).unwrap_or(DEFAULT_HTTPS_PORT)
    }

    /// Certificate and key paths when both are configured.
    #[must_use]
    pub fn tls_paths(&self) -> Option<(&Utf8Path, &Utf8Path)> {
        if self.cert.as_str().is_empty() || self.key.as_str().is_empty() {
            None
        } else {
            Some((&self.cert, &self.key))
        }
    }

    /// Log file to record to, if any.
    #[must_use]
    pub fn log_file(&self) -> Option<&Utf8Path> {
        (!self.log.as_str().is_empty()).then_some(self.log.as_path())
    }

    /// Parsed print level.
    pub fn print_level(&self) -> Result<LogLevel, LogLevelError> {
        LogLevel::parse(&self.log_level_print)
    }

    /// Parsed record level.
    pub fn record_level(&self) -> Result<LogLevel, LogLevelError> {
        LogLevel::parse(&self.log_level_record)
    }
}

fn positive_port(port: i32) -> Option<u16> {
    u16::try_from(port).ok().filter(|port| *port > 0)
}
