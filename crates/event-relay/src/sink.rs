// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Connections to the remote syslog sink.

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, StreamOwned};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::RelayError;

const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A single-use, blocking connection to the sink.
pub trait SinkConnection: Send {
    /// Writes the whole buffer.
    fn write(&mut self, buf: &[u8]) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;
}

/// Opens fresh sink connections.
pub trait SinkConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn SinkConnection>, RelayError>;
}

/// Connects to `host:port` over TLS, verifying the server against `host`.
#[derive(Debug, Clone)]
pub struct TlsSinkConnector {
    addr: String,
    server_name: ServerName<'static>,
    config: Arc<ClientConfig>,
}

impl TlsSinkConnector {
    pub fn new(addr: &str, config: Arc<ClientConfig>) -> Result<Self, RelayError> {
        let host = addr
            .rsplit_once(':')
            .map(|(host, _port)| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or_else(|| RelayError::Tls(format!("Remote log host '{addr}' has no host part")))?;
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| RelayError::Tls(format!("Invalid server name '{host}': {e}")))?;
        Ok(Self {
            addr: addr.to_string(),
            server_name,
            config,
        })
    }

    /// Tries every resolved address in turn.
    fn connect_tcp(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for socket_addr in self.addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&socket_addr, SOCKET_TIMEOUT) {
                Ok(socket) => return Ok(socket),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "address did not resolve")
        }))
    }

    fn open(&self) -> io::Result<StreamOwned<ClientConnection, TcpStream>> {
        let mut socket = self.connect_tcp()?;
        socket.set_read_timeout(Some(SOCKET_TIMEOUT))?;
        socket.set_write_timeout(Some(SOCKET_TIMEOUT))?;

        let mut conn = ClientConnection::new(Arc::clone(&self.config), self.server_name.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        // Drive the handshake now so a bad peer fails the connect, not the first write
        while conn.is_handshaking() {
            conn.complete_io(&mut socket)?;
        }
        Ok(StreamOwned::new(conn, socket))
    }
}

impl SinkConnector for TlsSinkConnector {
    fn connect(&self) -> Result<Box<dyn SinkConnection>, RelayError> {
        let stream = self.open().map_err(|source| RelayError::SinkConnect {
            addr: self.addr.clone(),
            source,
        })?;
        debug!("Connected to remote log host {}", self.addr);
        Ok(Box::new(TlsConnection { stream }))
    }
}

struct TlsConnection {
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl SinkConnection for TlsConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        self.stream.conn.send_close_notify();
        self.stream.flush()?;
        self.stream.sock.shutdown(Shutdown::Write)?;

        // Unread bytes (session tickets, the peer's own close) would turn the close into a reset
        self.stream.sock.set_read_timeout(Some(CLOSE_DRAIN_TIMEOUT))?;
        let mut scratch = [0u8; 1024];
        while let Ok(n) = self.stream.sock.read(&mut scratch) {
            if n == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::RootCertStore;

    fn client_config() -> Arc<ClientConfig> {
        Arc::new(
            relay_fips::rustls_adapter::create_rustls_client_config_with_roots(
                RootCertStore::empty(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_new_parses_host() {
        let connector = TlsSinkConnector::new("logs.example.com:6514", client_config()).unwrap();
        assert_eq!(
            connector.server_name,
            ServerName::try_from("logs.example.com").unwrap()
        );
    }

    #[test]
    fn test_new_accepts_ip_literals() {
        assert!(TlsSinkConnector::new("127.0.0.1:6514", client_config()).is_ok());
        assert!(TlsSinkConnector::new("[::1]:6514", client_config()).is_ok());
    }

    #[test]
    fn test_new_rejects_missing_host() {
        assert!(matches!(
            TlsSinkConnector::new(":6514", client_config()),
            Err(RelayError::Tls(_))
        ));
        assert!(matches!(
            TlsSinkConnector::new("no-port", client_config()),
            Err(RelayError::Tls(_))
        ));
    }

    #[test]
    fn test_connect_refused_is_sink_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = TlsSinkConnector::new(&addr.to_string(), client_config()).unwrap();
        let result = connector.connect();
        assert!(matches!(result, Err(RelayError::SinkConnect { .. })));
    }
}
