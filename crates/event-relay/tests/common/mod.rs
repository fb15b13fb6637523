// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use rcgen::{
    BasicConstraints, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose, SanType,
};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig, ServerConnection, StreamOwned};
use std::io::Read;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A syslog sink speaking TLS on the loopback interface.
///
/// Every accepted connection is read to the end and its bytes are sent on `received`.
pub struct TlsSinkServer {
    pub addr: SocketAddr,
    pub roots: RootCertStore,
    received: mpsc::Receiver<Vec<u8>>,
}

impl TlsSinkServer {
    pub fn start() -> Self {
        Self::serve(None)
    }

    /// Like [`TlsSinkServer::start`], but every connection is dropped without a TLS close
    /// once `limit` bytes of application data arrived.
    pub fn start_closing_after(limit: usize) -> Self {
        Self::serve(Some(limit))
    }

    fn serve(limit: Option<usize>) -> Self {
        let (ca_der, server_config) = generate_tls_materials();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind sink");
        let addr = listener.local_addr().expect("sink addr");
        let server_config = Arc::new(server_config);
        let (sender, received) = mpsc::channel();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(tcp) = stream else {
                    continue;
                };
                let Ok(conn) = ServerConnection::new(Arc::clone(&server_config)) else {
                    break;
                };
                let buf = read_connection(StreamOwned::new(conn, tcp), limit);
                if sender.send(buf).is_err() {
                    break;
                }
            }
        });

        let mut roots = RootCertStore::empty();
        roots.add(ca_der).expect("trust test ca");
        Self {
            addr,
            roots,
            received,
        }
    }

    /// Bytes of the next connection, once the client closed it.
    pub fn next_connection(&self) -> Vec<u8> {
        self.received
            .recv_timeout(Duration::from_secs(10))
            .expect("sink received a connection")
    }
}

/// Reads until the client closes, or until `limit` bytes arrived. The stream is dropped on return.
fn read_connection(
    mut tls: StreamOwned<ServerConnection, TcpStream>,
    limit: Option<usize>,
) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match tls.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if limit.is_some_and(|limit| buf.len() >= limit) {
            break;
        }
    }
    buf
}

fn generate_tls_materials() -> (CertificateDer<'static>, ServerConfig) {
    let mut ca_params = CertificateParams::default();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "event-relay-test-ca");
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca_key = KeyPair::generate().expect("ca key");
    let ca_cert = ca_params.self_signed(&ca_key).expect("ca cert");

    let mut leaf_params = CertificateParams::default();
    leaf_params
        .distinguished_name
        .push(DnType::CommonName, "syslog-sink");
    leaf_params.subject_alt_names = vec![
        SanType::DnsName("localhost".try_into().unwrap()),
        SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
    ];
    leaf_params.is_ca = IsCa::NoCa;
    leaf_params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    let leaf_key = KeyPair::generate().expect("leaf key");
    let leaf_cert = leaf_params
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .expect("leaf cert");

    let cert_chain = vec![CertificateDer::from(leaf_cert.der().to_vec())];
    let key_der = PrivatePkcs8KeyDer::from(leaf_key.serialize_der());
    let server_config = ServerConfig::builder_with_provider(ring::default_provider().into())
        .with_safe_default_protocol_versions()
        .expect("protocols")
        .with_no_client_auth()
        .with_single_cert(cert_chain, PrivateKeyDer::Pkcs8(key_der))
        .expect("server config");

    (CertificateDer::from(ca_cert.der().to_vec()), server_config)
}

/// Splits what a sink connection received into lines.
pub fn lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8(bytes.to_vec())
        .expect("utf8 lines")
        .lines()
        .map(str::to_string)
        .collect()
}
