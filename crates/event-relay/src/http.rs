// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport used to read the events API.
//!
//! The transport owns the retry policy for network failures and server errors. Whatever it
//! returns after its retries is final: the fetcher treats a transport error or a non-200
//! status as fatal.

use async_trait::async_trait;
use bytes::Bytes;
use core::time::Duration;
use relay_fips::reqwest_adapter::create_reqwest_client_builder;
use reqwest::StatusCode;
use std::error::Error;
use std::fmt::Debug;
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::error::RelayError;

/// Basic auth credentials for the events API.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    secret: String,
}

impl BasicAuth {
    pub fn new(username: String, secret: String) -> Self {
        Self { username, secret }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BasicAuth {{ username: {}, secret: *** }}", self.username)
    }
}

/// Status and full body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues a GET against `url`. Only returns an error once the transport has given up.
    async fn get(&self, url: &str, auth: &BasicAuth) -> Result<HttpResponse, TransportError>;
}

/// How many attempts a request gets, and how long to wait between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Retry right away, up to the given number of attempts
    Immediate(u64),
    /// Number of attempts, delay in milliseconds between attempts
    LinearBackoff(u64, u64),
}

impl RetryStrategy {
    fn max_attempts(&self) -> u64 {
        match self {
            RetryStrategy::Immediate(attempts) | RetryStrategy::LinearBackoff(attempts, _) => {
                (*attempts).max(1)
            }
        }
    }

    fn delay(&self) -> Duration {
        match self {
            RetryStrategy::Immediate(_) => Duration::ZERO,
            RetryStrategy::LinearBackoff(_, delay_ms) => Duration::from_millis(*delay_ms),
        }
    }
}

/// Transport backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    retry_strategy: RetryStrategy,
}

impl ReqwestTransport {
    pub fn new(
        https_proxy: Option<&str>,
        timeout: Duration,
        retry_strategy: RetryStrategy,
    ) -> Result<Self, RelayError> {
        let client = build_client(https_proxy, timeout)
            .map_err(|e| RelayError::Tls(format!("Unable to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry_strategy,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, auth: &BasicAuth) -> Result<HttpResponse, TransportError> {
        let max_attempts = self.retry_strategy.max_attempts();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let time = Instant::now();
            let result = self
                .client
                .get(url)
                .basic_auth(auth.username(), Some(auth.secret()))
                .send()
                .await;
            let elapsed = time.elapsed();

            let failure = match result {
                Ok(resp) => {
                    let status = resp.status();
                    let retryable =
                        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    if retryable && attempts < max_attempts {
                        format!("status {status}")
                    } else {
                        match resp.bytes().await {
                            Ok(body) => {
                                debug!(
                                    "Events API | {status} in {} ms from {url}",
                                    elapsed.as_millis()
                                );
                                return Ok(HttpResponse { status, body });
                            }
                            Err(e) => format!("failed to read body: {e}"),
                        }
                    }
                }
                Err(e) => format!("{e}"),
            };

            if attempts >= max_attempts {
                error!(
                    "Events API | Giving up on {url} after {attempts} attempts: {failure}"
                );
                return Err(TransportError(format!(
                    "giving up after {attempts} attempt(s): {failure}"
                )));
            }

            warn!("Events API | Attempt {attempts} for {url} failed: {failure}");
            let delay = self.retry_strategy.delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Builds the upstream client. A proxy, when given, is used for https requests.
pub fn build_client(
    https_proxy: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, Box<dyn Error + Send + Sync>> {
    let mut builder = create_reqwest_client_builder()?.timeout(timeout);
    if let Some(proxy) = https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    Ok(builder.build()?)
}
