// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors raised while loading the relay configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No url for current region setting: {0}")]
    UnknownRegion(String),

    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that end the relay loop. None of them is retried by the relay itself: the
/// transport has already spent its own retries, and a restart is left to the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Client failed completely, stop now. Url was {url}. {message}")]
    Transport { url: String, message: String },

    #[error("Statuscode was {status}, url is {url}")]
    UnexpectedStatus { url: String, status: StatusCode },

    #[error("Settled page at {url} could not be decoded: {message}")]
    Decode { url: String, message: String },

    #[error("Page at {url} has no next cursor")]
    MissingCursor { url: String },

    #[error("Failed to connect to remote log host {addr}: {source}")]
    SinkConnect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to remote log host: {0}")]
    SinkWrite(#[source] std::io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Push task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
