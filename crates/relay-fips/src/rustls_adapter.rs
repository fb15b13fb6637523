// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use std::error::Error;
use std::sync::Arc;
use tracing::debug;

pub type TlsSetupError = Box<dyn Error + Send + Sync>;

/// Installs the process-wide crypto provider.
///
/// In fips mode this must run before any TLS client is built. In standard mode the
/// ring provider is passed explicitly to every builder, so this is a no-op.
#[cfg(feature = "fips")]
pub fn prepare_client_provider() -> Result<(), TlsSetupError> {
    rustls::crypto::default_fips_provider()
        .install_default()
        .map_err(|_| "Failed to install the FIPS crypto provider")?;
    debug!("Installed FIPS crypto provider");
    Ok(())
}

#[cfg(not(feature = "fips"))]
pub fn prepare_client_provider() -> Result<(), TlsSetupError> {
    Ok(())
}

#[cfg(not(feature = "fips"))]
pub fn crypto_provider() -> Result<Arc<CryptoProvider>, TlsSetupError> {
    Ok(Arc::new(rustls::crypto::ring::default_provider()))
}

/// Returns the installed provider after checking it is FIPS compliant.
#[cfg(feature = "fips")]
pub fn crypto_provider() -> Result<Arc<CryptoProvider>, TlsSetupError> {
    let provider =
        CryptoProvider::get_default().ok_or("No crypto provider configured")?;
    if !provider.fips() {
        return Err("Crypto provider is not FIPS-compliant".into());
    }
    Ok(Arc::clone(provider))
}

/// Loads the platform's native root certificates, skipping the ones rustls rejects.
pub fn load_native_roots() -> Result<RootCertStore, TlsSetupError> {
    let mut root_cert_store = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs();
    for err in &native_certs.errors {
        debug!("Failed to load native certificate: {:?}", err);
    }
    let mut valid_count = 0;
    for cert in native_certs.certs {
        match root_cert_store.add(cert) {
            Ok(()) => valid_count += 1,
            Err(err) => {
                debug!("Failed to parse certificate: {:?}", err);
            }
        }
    }
    if valid_count == 0 {
        return Err("No valid certificates found in native root store".into());
    }
    Ok(root_cert_store)
}

/// Builds a client configuration that trusts `roots`.
pub fn create_rustls_client_config_with_roots(
    roots: RootCertStore,
) -> Result<ClientConfig, TlsSetupError> {
    let provider = crypto_provider()?;
    let versions = rustls::ALL_VERSIONS.to_vec();
    let config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&versions)
        .map_err(|_| "Failed to set protocol versions")?
        .with_root_certificates(roots)
        .with_no_client_auth();

    #[cfg(feature = "fips")]
    if !config.fips() {
        return Err("The final TLS configuration is not FIPS-compliant".into());
    }

    Ok(config)
}

/// Builds a client configuration that trusts the platform's native roots.
pub fn create_rustls_client_config() -> Result<ClientConfig, TlsSetupError> {
    create_rustls_client_config_with_roots(load_native_roots()?)
}

#[cfg(all(test, not(feature = "fips")))]
mod tests {
    use super::*;

    #[test]
    fn test_standard_provider_is_available() {
        assert!(prepare_client_provider().is_ok());
        assert!(crypto_provider().is_ok());
    }

    #[test]
    fn test_client_config_with_empty_roots() {
        let config = create_rustls_client_config_with_roots(RootCertStore::empty());
        assert!(config.is_ok());
    }
}
