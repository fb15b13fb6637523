// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use crate::http::BasicAuth;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const EU_API_URL: &str = "https://api.eu.mailgun.net/v3/";
const US_API_URL: &str = "https://api.mailgun.net/v3/";
const DEFAULT_API_USERNAME: &str = "api";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Region of the events API. Each region has its own fixed base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Eu,
    Us,
}

impl Region {
    pub fn base_url(self) -> &'static str {
        match self {
            Region::Eu => EU_API_URL,
            Region::Us => US_API_URL,
        }
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eu" => Ok(Region::Eu),
            "us" => Ok(Region::Us),
            other => Err(ConfigError::UnknownRegion(other.to_string())),
        }
    }
}

/// Relay configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub region: Region,
    /// Base URL the events path is appended to. Always ends with '/'.
    pub api_base_url: String,
    /// Mailbox domain whose events are relayed, also the syslog app-name
    pub mail_domain: String,
    /// Minimum age of a page's last event before the page is forwarded
    pub settle_threshold: Duration,
    pub api_credentials: BasicAuth,
    /// Sink address as host:port
    pub remote_log_host: String,
    /// Hostname label written in every syslog header
    pub log_hostname: String,
    /// Unix second the relay starts reading from. Process start time when unset.
    pub begin_timestamp: Option<i64>,
    pub log_level: String,
    pub https_proxy: Option<String>,
}

impl Config {
    /// Create configuration from environment variables.
    ///
    /// The region is resolved first, so an unknown region fails before anything else is
    /// looked at.
    pub fn from_env() -> Result<Self, ConfigError> {
        let region: Region = env::var("MAILGUN_REGION").unwrap_or_default().parse()?;

        // EVENTS_API_URL is primarily used by integration tests to point at a local server
        let api_base_url = match env::var("EVENTS_API_URL") {
            Ok(url) if url.ends_with('/') => url,
            Ok(url) => format!("{url}/"),
            Err(_) => region.base_url().to_string(),
        };

        let mail_domain = env::var("MAIL_DOMAIN").map_err(|_| ConfigError::Missing("MAIL_DOMAIN"))?;

        let settle_threshold = match env::var("OLD_THRESHOLD_SECONDS") {
            Ok(val) => Duration::from_secs(val.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "OLD_THRESHOLD_SECONDS must be a whole number of seconds, got '{val}'"
                ))
            })?),
            Err(_) => {
                warn!("OLD_THRESHOLD_SECONDS not set, pages settle as soon as they are fetched");
                Duration::ZERO
            }
        };

        let username = env::var("MAILGUN_API_USERNAME")
            .unwrap_or_else(|_| DEFAULT_API_USERNAME.to_string());
        let secret = env::var("MAILGUN_API_SECRET")
            .map_err(|_| ConfigError::Missing("MAILGUN_API_SECRET"))?;

        let remote_log_host =
            env::var("REMOTE_LOG_HOST").map_err(|_| ConfigError::Missing("REMOTE_LOG_HOST"))?;

        let log_hostname = env::var("LOG_HOSTNAME")
            .ok()
            .filter(|hostname| !hostname.is_empty())
            .unwrap_or_else(get_hostname);

        let begin_timestamp = match env::var("BEGIN_TIMESTAMP") {
            Ok(val) => Some(val.trim().parse::<i64>().map_err(|_| {
                ConfigError::Invalid(format!("BEGIN_TIMESTAMP must be a Unix timestamp, got '{val}'"))
            })?),
            Err(_) => None,
        };

        let log_level = env::var("RELAY_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            region,
            api_base_url,
            mail_domain,
            settle_threshold,
            api_credentials: BasicAuth::new(username, secret),
            remote_log_host,
            log_hostname,
            begin_timestamp,
            log_level,
            https_proxy: env::var("HTTPS_PROXY").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mail_domain.trim().is_empty() {
            return Err(ConfigError::Invalid("MAIL_DOMAIN cannot be empty".to_string()));
        }

        match self.remote_log_host.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "REMOTE_LOG_HOST must be host:port, got '{}'",
                    self.remote_log_host
                )));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// First page of the event log, starting at `begin` (Unix seconds), oldest first.
    pub fn initial_url(&self, begin: i64) -> String {
        format!(
            "{}{}/events?begin={begin}&ascending=yes",
            self.api_base_url, self.mail_domain
        )
    }
}

/// Get the system hostname, falling back to "unknown".
#[must_use]
pub fn get_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(hostname_osstr) => {
            if let Some(hostname_str) = hostname_osstr.to_str() {
                if !hostname_str.is_empty() {
                    return hostname_str.to_string();
                }
            }
        }
        Err(e) => {
            warn!("Failed to get system hostname: {}", e);
        }
    }

    warn!("Could not determine hostname, using 'unknown'");
    "unknown".to_string()
}
