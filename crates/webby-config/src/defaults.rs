use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

/// Location of the options file read by the daemon.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/webby/config.json";

/// Content root served when the options leave `Site` empty.
pub const DEFAULT_SITE_PATH: &str = "/srv/webby/website";

/// Log file written by the daemon unless the options override it.
pub const DEFAULT_LOG_PATH: &str = "/srv/webby/webby.log";

/// Port used when the options do not name a positive port.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Port used for HTTPS when the options do not name a positive TLS port.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

const SOCKET_FILE_NAME: &str = "webby.sock";

/// Computes the well-known control socket path.
///
/// Prefers the per-user runtime directory and falls back to a uid-namespaced
/// directory under the system temporary directory.
#[must_use]
pub fn default_socket_path() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("webby");
    if apply_namespace {
        base.push(user_namespace());
    }
    base.join(SOCKET_FILE_NAME)
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(not(unix))]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    None
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn user_namespace() -> String {
    "shared".to_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn socket_path_lives_in_a_webby_directory() {
        let path = default_socket_path();
        assert_eq!(path.file_name(), Some(SOCKET_FILE_NAME));
        let namespaced = path
            .ancestors()
            .any(|ancestor| ancestor.file_name() == Some("webby"));
        assert!(namespaced, "expected a webby directory in {path}");
    }
}
