// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Main loop: fetch a settled page, push it, follow its `next` cursor.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::RelayError;
use crate::fetcher::Fetcher;
use crate::page::Event;
use crate::pusher::{Pusher, DEFAULT_FLUSH_DELAY};
use crate::sink::SinkConnector;
use crate::syslog::SyslogIdentity;

pub struct Relay {
    fetcher: Fetcher,
    connector: Arc<dyn SinkConnector>,
    clock: Arc<dyn Clock>,
    identity: SyslogIdentity,
    flush_delay: Duration,
}

impl Relay {
    pub fn new(
        fetcher: Fetcher,
        connector: Arc<dyn SinkConnector>,
        clock: Arc<dyn Clock>,
        identity: SyslogIdentity,
    ) -> Self {
        Self {
            fetcher,
            connector,
            clock,
            identity,
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }

    #[must_use]
    pub fn with_flush_delay(mut self, flush_delay: Duration) -> Self {
        self.flush_delay = flush_delay;
        self
    }

    /// Relays pages starting at `start_url` until `cancel` fires or an error is fatal.
    ///
    /// Cancellation is observed while a page is being fetched or settling. A push that has
    /// started always completes. The cursor only moves after its page was pushed.
    pub async fn run(&self, start_url: String, cancel: CancellationToken) -> Result<(), RelayError> {
        let mut cursor = start_url;
        info!("Relaying events from {cursor}");

        loop {
            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Relay cancelled, stopping before {cursor}");
                    return Ok(());
                }
                page = self.fetcher.fetch(&cursor) => page?,
            };

            let Some(next) = page.paging.next.clone() else {
                return Err(RelayError::MissingCursor { url: cursor });
            };

            let count = page.len();
            self.forward(page.items).await?;
            info!("Forwarded {count} events, next page is {next}");
            cursor = next;
        }
    }

    async fn forward(&self, events: Vec<Event>) -> Result<(), RelayError> {
        let connector = Arc::clone(&self.connector);
        let clock = Arc::clone(&self.clock);
        let identity = self.identity.clone();
        let flush_delay = self.flush_delay;

        debug!("Pushing {} events", events.len());
        tokio::task::spawn_blocking(move || {
            Pusher::connect(connector.as_ref(), identity, clock, flush_delay)?.push(&events)
        })
        .await?
    }
}
