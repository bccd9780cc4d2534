//! HTTPS support for the hosted site.

use axum_server::tls_rustls::RustlsConfig;
use camino::Utf8Path;
use rustls::crypto::{CryptoProvider, ring};
use tokio::runtime::Runtime;
use tracing::debug;

use super::{SERVER_TARGET, ServerError};

/// Loads the PEM certificate chain and private key into a rustls config.
pub(super) fn load_config(
    runtime: &Runtime,
    cert: &Utf8Path,
    key: &Utf8Path,
) -> Result<RustlsConfig, ServerError> {
    install_crypto_provider();
    runtime
        .block_on(RustlsConfig::from_pem_file(cert, key))
        .map_err(|source| ServerError::TlsConfig {
            cert: cert.to_path_buf(),
            key: key.to_path_buf(),
            source,
        })
}

fn install_crypto_provider() {
    if CryptoProvider::get_default().is_some() {
        return;
    }
    // Losing a race to another installer still leaves a provider in place.
    if ring::default_provider().install_default().is_err() {
        debug!(target: SERVER_TARGET, "crypto provider already installed");
    }
}
