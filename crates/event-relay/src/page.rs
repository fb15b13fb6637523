// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Page of the events API and the normalization applied to it before forwarding.
//!
//! A page body looks like:
//! ```text
//! { "items": [ { ..., "timestamp": 1636646172.343453 }, ... ],
//!   "paging": { "previous": url, "first": url, "last": url, "next": url } }
//! ```
//! Events are kept as opaque JSON text. Only the timestamp of the last event is read,
//! to decide whether the page has settled.

use serde::Deserialize;
use serde_json::value::RawValue;

/// One event, as the compact JSON text it was received as.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct Event(Box<RawValue>);

impl Event {
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Bytes forwarded to the sink after the syslog header.
    pub fn payload(&self) -> &[u8] {
        self.0.get().as_bytes()
    }
}

/// Continuation links of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<Event>,
    #[serde(default)]
    pub paging: Paging,
}

impl Page {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Re-encodes a JSON document without insignificant whitespace.
///
/// Key order and number text are kept as received.
pub fn normalize(body: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let document: serde_json::Value = serde_json::from_slice(body)?;
    serde_json::to_vec(&document)
}

#[derive(Deserialize)]
struct ProbeItem {
    #[serde(default)]
    timestamp: Option<f64>,
}

#[derive(Deserialize)]
struct Probe {
    #[serde(default)]
    items: Vec<ProbeItem>,
}

/// What the settle check needs to know about a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSummary {
    pub count: usize,
    /// Timestamp of the last event, `None` for an empty page. An event whose timestamp is
    /// missing or null counts as 0.
    pub last_timestamp: Option<f64>,
}

impl PageSummary {
    pub fn probe(body: &[u8]) -> Result<Self, serde_json::Error> {
        let probe: Probe = serde_json::from_slice(body)?;
        Ok(Self {
            count: probe.items.len(),
            last_timestamp: probe
                .items
                .last()
                .map(|item| item.timestamp.unwrap_or_default()),
        })
    }
}
