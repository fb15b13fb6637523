// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! RFC5424-flavored framing of forwarded events.
//!
//! Every line is `<PRI>1 TIMESTAMP HOSTNAME APP-NAME PROCID - - ` followed by the event
//! JSON. MSGID and STRUCTURED-DATA are always nil.

use chrono::{DateTime, SecondsFormat, TimeZone};
use std::fmt::Display;

/// Facility 10 (security/authorization), severity 0.
pub const PRIORITY: u8 = 80;
pub const VERSION: u8 = 1;
const NIL: &str = "-";

/// Who the forwarded lines claim to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogIdentity {
    pub hostname: String,
    pub app_name: String,
    pub proc_id: u32,
}

impl SyslogIdentity {
    /// Identity of the current process.
    pub fn new(hostname: String, app_name: String) -> Self {
        Self {
            hostname,
            app_name,
            proc_id: std::process::id(),
        }
    }
}

/// Header shared by every line of one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogHeader(Vec<u8>);

impl SyslogHeader {
    pub fn new<Tz: TimeZone>(identity: &SyslogIdentity, timestamp: &DateTime<Tz>) -> Self
    where
        Tz::Offset: Display,
    {
        let header = format!(
            "<{PRIORITY}>{VERSION} {} {} {} {} {NIL} {NIL} ",
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            identity.hostname,
            identity.app_name,
            identity.proc_id,
        );
        Self(header.into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Header followed by `payload`, without the line terminator.
    pub fn frame(&self, payload: &[u8]) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.0.len() + payload.len());
        line.extend_from_slice(&self.0);
        line.extend_from_slice(payload);
        line
    }
}
