// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::rustls_adapter::TlsSetupError;
use reqwest::ClientBuilder;
#[cfg(feature = "fips")]
use tracing::debug;

/// Creates a reqwest client builder with TLS configuration.
/// When the "fips" feature is enabled, it uses a FIPS-compliant TLS configuration.
/// Otherwise, it uses reqwest's default rustls TLS implementation.
#[cfg(not(feature = "fips"))]
pub fn create_reqwest_client_builder() -> Result<ClientBuilder, TlsSetupError> {
    Ok(reqwest::Client::builder().use_rustls_tls())
}

/// Creates a reqwest client builder with FIPS-compliant TLS configuration, trusting the
/// platform's native root certificates.
#[cfg(feature = "fips")]
pub fn create_reqwest_client_builder() -> Result<ClientBuilder, TlsSetupError> {
    let config = crate::rustls_adapter::create_rustls_client_config()?;
    debug!("Client builder is configured with FIPS.");
    Ok(reqwest::Client::builder().use_preconfigured_tls(config))
}
