// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Event Relay
//!
//! Drains the Mailgun events API page by page and republishes every event as a syslog
//! line to a remote TLS sink.
//!
//! - [`fetcher`]: fetches a page until it has settled
//! - [`pusher`]: frames and writes one page over a fresh sink connection
//! - [`relay`]: follows the `next` cursor, one page at a time, until cancelled
//!
//! The HTTP transport, the clock and the sink connector are injected as traits so the
//! loop can be driven without network or wall-clock time.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod clock;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod logger;
pub mod page;
pub mod pusher;
pub mod relay;
pub mod sink;
pub mod syslog;
