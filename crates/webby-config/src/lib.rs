//! Shared configuration for the webby daemon and its control invocation.
//!
//! Options are stored as a JSON document whose keys mirror the field names of
//! [`ServerOptions`]. Loading never fails outright: any stat, read, or parse
//! problem yields the defaults together with a [`ConfigError`] diagnostic the
//! caller can log. Log levels are a single bitmask type, [`LogLevel`], with
//! one parser for configuration text and one validator for wire bytes.

mod defaults;
mod level;
mod logging;
mod options;
mod socket;

pub use defaults::{
    DEFAULT_CONFIG_PATH, DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT, DEFAULT_LOG_PATH, DEFAULT_SITE_PATH,
    default_socket_path,
};
pub use level::{LogLevel, LogLevelError};
pub use logging::LogFormat;
pub use options::{ConfigError, ServerOptions, load_options};
pub use socket::{SocketPreparationError, prepare_socket_directory};
