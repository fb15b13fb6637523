// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! TLS client construction shared by the upstream HTTP client and the syslog sink.
//!
//! Both sides build their TLS configuration here so that enabling the `fips` feature
//! switches the whole relay to the FIPS crypto provider at once.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

#[cfg(all(feature = "default", feature = "fips"))]
compile_error!("When building in fips mode, the default feature must be disabled");

pub mod reqwest_adapter;
pub mod rustls_adapter;
