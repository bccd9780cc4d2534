use std::fs::DirBuilder;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Ensures the control socket's parent directory exists with restrictive
/// permissions.
pub fn prepare_socket_directory(path: &Utf8Path) -> Result<(), SocketPreparationError> {
    let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) else {
        return Err(SocketPreparationError::MissingParent {
            path: path.to_path_buf(),
        });
    };

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    if let Err(source) = builder.create(parent.as_std_path())
        && source.kind() != std::io::ErrorKind::AlreadyExists
    {
        return Err(SocketPreparationError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        });
    }

    Ok(())
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Configured socket path.
        path: Utf8PathBuf,
    },
    /// Failed to create the socket directory.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        let socket = root.join("run/webby/webby.sock");
        prepare_socket_directory(&socket).expect("prepare directory");
        assert!(root.join("run/webby").is_dir());
    }

    #[test]
    fn bare_file_names_have_no_parent() {
        let error = prepare_socket_directory(Utf8Path::new("webby.sock"))
            .expect_err("bare name should be rejected");
        assert!(matches!(error, SocketPreparationError::MissingParent { .. }));
    }
}
