// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use event_relay::{
    clock::{Clock, SystemClock},
    config::Config,
    error::RelayError,
    fetcher::Fetcher,
    http::{ReqwestTransport, RetryStrategy},
    logger::Formatter,
    relay::Relay,
    sink::TlsSinkConnector,
    syslog::SyslogIdentity,
};
use relay_fips::rustls_adapter::{create_rustls_client_config, prepare_client_provider};

const EVENTS_API_TIMEOUT: Duration = Duration::from_secs(30);
const EVENTS_API_RETRY: RetryStrategy = RetryStrategy::LinearBackoff(5, 1000);

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("RELAY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let env_filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("could not parse log level '{log_level}': {e}");
            return ExitCode::FAILURE;
        }
    };

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .event_format(Formatter)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading relay configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match start(config).await {
        Ok(()) => {
            info!("Event relay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Event relay failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn start(config: Config) -> Result<(), RelayError> {
    prepare_client_provider().map_err(|e| RelayError::Tls(e.to_string()))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport = ReqwestTransport::new(
        config.https_proxy.as_deref(),
        EVENTS_API_TIMEOUT,
        EVENTS_API_RETRY,
    )?;
    let fetcher = Fetcher::new(
        Arc::new(transport),
        Arc::clone(&clock),
        config.api_credentials.clone(),
        config.settle_threshold,
    );

    let sink_tls = create_rustls_client_config()
        .map_err(|e| RelayError::Tls(format!("Unable to build sink TLS config: {e}")))?;
    let connector = TlsSinkConnector::new(&config.remote_log_host, Arc::new(sink_tls))?;

    let identity = SyslogIdentity::new(config.log_hostname.clone(), config.mail_domain.clone());
    let relay = Relay::new(fetcher, Arc::new(connector), Arc::clone(&clock), identity);

    let begin = config
        .begin_timestamp
        .unwrap_or_else(|| clock.now().timestamp());
    info!(
        "Starting event relay for {} from {begin} to {}, threshold {}s",
        config.mail_domain,
        config.remote_log_host,
        config.settle_threshold.as_secs()
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    relay.run(config.initial_url(begin), cancel).await
}

/// Cancels `cancel` on SIGINT, or SIGTERM where there is one.
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received, stopping relay");
    cancel.cancel();
}
