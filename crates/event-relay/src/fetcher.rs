// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fetch-and-settle loop.
//!
//! The events API is eventually consistent: a page fetched too soon after its newest event
//! may still gain events. A page is only handed on once its last event is at least
//! `threshold` old. Younger pages, empty pages and unreadable bodies are fetched again
//! after [`SETTLE_RETRY_INTERVAL`], as many times as it takes.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::RelayError;
use crate::http::{BasicAuth, HttpTransport};
use crate::page::{self, Page, PageSummary};
use reqwest::StatusCode;

pub const SETTLE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Outcome of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Settlement {
    /// Non-empty and old enough to forward
    Settled { last_timestamp: i64 },
    /// The newest event is younger than the threshold
    Fresh {
        last_timestamp: i64,
        necessary_wait_time: i64,
    },
    /// No events, so nothing proves the page is complete
    Empty,
    /// The body could not be read. Handled like an empty page.
    Unreadable,
}

impl Settlement {
    /// Judges a page given the current Unix second and the threshold in seconds.
    /// Comparison is on whole seconds, the timestamp being truncated toward zero.
    pub fn judge(summary: &PageSummary, now: i64, threshold_secs: i64) -> Self {
        let Some(last) = summary.last_timestamp else {
            return Settlement::Empty;
        };
        let last_timestamp = last.trunc() as i64;
        let necessary_wait_time = now - threshold_secs;
        if last_timestamp > necessary_wait_time {
            Settlement::Fresh {
                last_timestamp,
                necessary_wait_time,
            }
        } else {
            Settlement::Settled { last_timestamp }
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Settlement::Settled { .. })
    }
}

pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    auth: BasicAuth,
    threshold: Duration,
    retry_interval: Duration,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        auth: BasicAuth,
        threshold: Duration,
    ) -> Self {
        Self {
            transport,
            clock,
            auth,
            threshold,
            retry_interval: SETTLE_RETRY_INTERVAL,
        }
    }

    /// Fetches `url` until the page has settled and returns it.
    pub async fn fetch(&self, url: &str) -> Result<Page, RelayError> {
        loop {
            let body = self.try_to_fetch(url).await?;
            let settlement = match &body {
                Some(body) => self.settlement(url, body),
                None => Settlement::Unreadable,
            };
            debug!("Settle verdict for {url}: {settlement:?}");

            if let (Some(body), true) = (body, settlement.is_settled()) {
                return Page::from_slice(&body).map_err(|e| RelayError::Decode {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }

            debug!(
                "Page not settled, fetching again in {}s",
                self.retry_interval.as_secs()
            );
            self.clock.sleep(self.retry_interval).await;
        }
    }

    /// One request. Returns the normalized body, or `None` when the body is not JSON.
    async fn try_to_fetch(&self, url: &str) -> Result<Option<Vec<u8>>, RelayError> {
        let response = self
            .transport
            .get(url, &self.auth)
            .await
            .map_err(|e| RelayError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if response.status != StatusCode::OK {
            return Err(RelayError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        match page::normalize(&response.body) {
            Ok(body) => Ok(Some(body)),
            Err(e) => {
                warn!("Body from {url} is not valid JSON, treating it as empty: {e}");
                Ok(None)
            }
        }
    }

    fn settlement(&self, url: &str, body: &[u8]) -> Settlement {
        match PageSummary::probe(body) {
            Ok(summary) => {
                debug!(
                    "{} events from {url}, last timestamp {:?}",
                    summary.count, summary.last_timestamp
                );
                let threshold_secs = i64::try_from(self.threshold.as_secs()).unwrap_or(i64::MAX);
                Settlement::judge(&summary, self.clock.now().timestamp(), threshold_secs)
            }
            Err(e) => {
                warn!("Events from {url} could not be read, treating page as empty: {e}");
                Settlement::Unreadable
            }
        }
    }
}
