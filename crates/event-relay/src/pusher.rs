// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards one page of events to the sink over a fresh connection.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::RelayError;
use crate::page::Event;
use crate::sink::{SinkConnection, SinkConnector};
use crate::syslog::{SyslogHeader, SyslogIdentity};

/// Pause between the last write and closing the connection, so the peer drains the stream.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(100);

const LINE_END: &[u8] = b"\n";

/// Owns one sink connection for the duration of one push. Blocking.
pub struct Pusher {
    conn: Box<dyn SinkConnection>,
    identity: SyslogIdentity,
    clock: Arc<dyn Clock>,
    flush_delay: Duration,
}

impl Pusher {
    pub fn connect(
        connector: &dyn SinkConnector,
        identity: SyslogIdentity,
        clock: Arc<dyn Clock>,
        flush_delay: Duration,
    ) -> Result<Self, RelayError> {
        let conn = connector.connect()?;
        Ok(Self::new(conn, identity, clock, flush_delay))
    }

    pub fn new(
        conn: Box<dyn SinkConnection>,
        identity: SyslogIdentity,
        clock: Arc<dyn Clock>,
        flush_delay: Duration,
    ) -> Self {
        Self {
            conn,
            identity,
            clock,
            flush_delay,
        }
    }

    /// Writes every event as one line, in order, then closes the connection.
    ///
    /// All lines share one header, stamped with the local time at the start of the push.
    /// Each event costs two writes: the framed line, then the newline. Once every write went
    /// through the page counts as delivered, so a failing close is only logged.
    pub fn push(mut self, events: &[Event]) -> Result<(), RelayError> {
        let header = SyslogHeader::new(
            &self.identity,
            &self.clock.now().with_timezone(&Local),
        );

        for event in events {
            self.conn
                .write(&header.frame(event.payload()))
                .map_err(RelayError::SinkWrite)?;
            self.conn.write(LINE_END).map_err(RelayError::SinkWrite)?;
        }

        if !self.flush_delay.is_zero() {
            std::thread::sleep(self.flush_delay);
        }
        if let Err(e) = self.conn.close() {
            warn!("Closing the sink connection failed after all events were written: {e}");
        }
        debug!("Pushed {} events", events.len());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetcher::tests::{ManualClock, NOW};
    use crate::page::Page;
    use std::io;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// What a recording connection saw, shared with the test after the push consumed it.
    #[derive(Debug, Default)]
    pub(crate) struct Recording {
        pub(crate) writes: Vec<Vec<u8>>,
        pub(crate) closes: usize,
        pub(crate) connects: usize,
    }

    impl Recording {
        /// Concatenation of all writes, split on newlines.
        pub(crate) fn lines(&self) -> Vec<String> {
            let all: Vec<u8> = self.writes.concat();
            String::from_utf8(all)
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    pub(crate) struct RecordingConnection {
        recording: Arc<Mutex<Recording>>,
        fail_writes: bool,
        fail_close: bool,
    }

    impl SinkConnection for RecordingConnection {
        fn write(&mut self, buf: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.recording.lock().unwrap().writes.push(buf.to_vec());
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            self.recording.lock().unwrap().closes += 1;
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            Ok(())
        }
    }

    /// Hands out connections that all record into the same place.
    #[derive(Default)]
    pub(crate) struct RecordingConnector {
        pub(crate) recording: Arc<Mutex<Recording>>,
        pub(crate) fail_writes: bool,
        pub(crate) fail_close: bool,
    }

    impl SinkConnector for RecordingConnector {
        fn connect(&self) -> Result<Box<dyn SinkConnection>, RelayError> {
            self.recording.lock().unwrap().connects += 1;
            Ok(Box::new(RecordingConnection {
                recording: Arc::clone(&self.recording),
                fail_writes: self.fail_writes,
                fail_close: self.fail_close,
            }))
        }
    }

    pub(crate) fn identity() -> SyslogIdentity {
        SyslogIdentity {
            hostname: "relay-host".to_string(),
            app_name: "mg.example.com".to_string(),
            proc_id: 4242,
        }
    }

    fn events(body: &str) -> Vec<Event> {
        Page::from_slice(body.as_bytes()).unwrap().items
    }

    fn pusher(connector: &RecordingConnector) -> Pusher {
        Pusher::connect(
            connector,
            identity(),
            Arc::new(ManualClock::at(NOW)),
            Duration::ZERO,
        )
        .unwrap()
    }

    #[test]
    fn test_push_writes_two_per_event_then_closes() {
        let connector = RecordingConnector::default();
        let events = events(r#"{"items":[{"timestamp":1},{"timestamp":2},{"timestamp":3}]}"#);

        pusher(&connector).push(&events).unwrap();

        let recording = connector.recording.lock().unwrap();
        assert_eq!(recording.connects, 1);
        assert_eq!(recording.writes.len(), 6);
        assert_eq!(recording.closes, 1);
        for newline in recording.writes.iter().skip(1).step_by(2) {
            assert_eq!(newline, b"\n");
        }
    }

    #[test]
    fn test_push_shares_one_header() {
        let connector = RecordingConnector::default();
        let events = events(r#"{"items":[{"timestamp":1,"event":"a"},{"timestamp":2}]}"#);

        pusher(&connector).push(&events).unwrap();

        let lines = connector.recording.lock().unwrap().lines();
        assert_eq!(lines.len(), 2);
        let (header_a, payload_a) = lines[0].split_at(lines[0].find('{').unwrap());
        let (header_b, payload_b) = lines[1].split_at(lines[1].find('{').unwrap());
        assert_eq!(header_a, header_b);
        assert!(header_a.starts_with("<80>1 "));
        assert!(header_a.ends_with(" relay-host mg.example.com 4242 - - "));
        assert_eq!(payload_a, r#"{"timestamp":1,"event":"a"}"#);
        assert_eq!(payload_b, r#"{"timestamp":2}"#);
    }

    #[test]
    fn test_push_header_uses_local_time() {
        let connector = RecordingConnector::default();
        pusher(&connector)
            .push(&events(r#"{"items":[{"timestamp":1}]}"#))
            .unwrap();

        let expected = SyslogHeader::new(
            &identity(),
            &ManualClock::at(NOW).now().with_timezone(&Local),
        );
        let recording = connector.recording.lock().unwrap();
        assert!(recording.writes[0].starts_with(expected.as_bytes()));
    }

    #[test]
    fn test_push_without_events_only_closes() {
        let connector = RecordingConnector::default();

        pusher(&connector).push(&[]).unwrap();

        let recording = connector.recording.lock().unwrap();
        assert_eq!(recording.connects, 1);
        assert!(recording.writes.is_empty());
        assert_eq!(recording.closes, 1);
    }

    #[test]
    fn test_write_failure_aborts_push() {
        let connector = RecordingConnector {
            fail_writes: true,
            ..Default::default()
        };

        let err = pusher(&connector)
            .push(&events(r#"{"items":[{"timestamp":1}]}"#))
            .unwrap_err();

        assert!(matches!(err, RelayError::SinkWrite(_)));
        assert_eq!(connector.recording.lock().unwrap().closes, 0);
    }

    #[test]
    #[traced_test]
    fn test_close_failure_after_delivery_is_not_fatal() {
        let connector = RecordingConnector {
            fail_close: true,
            ..Default::default()
        };

        pusher(&connector)
            .push(&events(r#"{"items":[{"timestamp":1},{"timestamp":2}]}"#))
            .unwrap();

        let recording = connector.recording.lock().unwrap();
        assert_eq!(recording.writes.len(), 4);
        assert_eq!(recording.closes, 1);
        assert!(logs_contain("Closing the sink connection failed"));
    }
}
