//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Integration tests for WebSocket message connections over TLS.
//!
//! Closing a TLS-backed connection sends the close frame and then shuts the
//! TLS session down with close_notify instead of applying linger. These
//! tests verify that the peer observes a clean end of stream.

#![cfg(feature = "tls")]

use futures_util::StreamExt;
use polyconn::{Connection, MessageConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as ClientTlsStream;
use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use tokio_rustls::server::TlsStream as ServerTlsStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Builds an acceptor and a connector sharing a self-signed certificate for
/// `localhost`.
fn tls_pair() -> (TlsAcceptor, TlsConnector) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("Failed to generate certificate");
    let cert: CertificateDer<'static> = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let server = rustls::ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .expect("Failed to select protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .expect("Failed to build server config");

    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert).expect("Failed to trust certificate");
    let client = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to select protocol versions")
        .with_root_certificates(roots)
        .with_no_client_auth();

    (
        TlsAcceptor::from(Arc::new(server)),
        TlsConnector::from(Arc::new(client)),
    )
}

/// Performs TLS and WebSocket handshakes over loopback.
async fn handshake() -> (
    WebSocketStream<ServerTlsStream<TcpStream>>,
    WebSocketStream<ClientTlsStream<TcpStream>>,
) {
    let (acceptor, connector) = tls_pair();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get listener address");

    let server = async {
        let (stream, _) = listener.accept().await.expect("Failed to accept connection");
        let tls = acceptor.accept(stream).await.expect("Failed TLS accept");
        tokio_tungstenite::accept_async(tls)
            .await
            .expect("Failed to accept WebSocket")
    };
    let client = async {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let name = ServerName::try_from("localhost").expect("Invalid server name");
        let tls = connector
            .connect(name, stream)
            .await
            .expect("Failed TLS connect");
        let (ws, _) = tokio_tungstenite::client_async("wss://localhost/", tls)
            .await
            .expect("Failed to perform client handshake");
        ws
    };

    tokio::join!(server, client)
}

/// Receives the close frame, then expects a clean TLS end of stream.
async fn expect_close_then_eof<S>(mut peer: WebSocketStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let received = timeout(Duration::from_secs(2), peer.next())
        .await
        .expect("No close frame received")
        .expect("Stream ended")
        .expect("Failed to receive close frame");
    match received {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected close frame, got {:?}", other),
    }

    // Without close_notify the TLS layer reports an unexpected EOF instead.
    let mut tail = Vec::new();
    let count = timeout(Duration::from_secs(2), peer.get_mut().read_to_end(&mut tail))
        .await
        .expect("TLS stream did not end")
        .expect("TLS stream ended without close_notify");
    assert_eq!(count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_close_sends_close_notify() {
    let (server, client) = handshake().await;
    let server = MessageConnection::new(server);
    assert!(server.peer_addr().is_some());

    server
        .close(Some(Duration::from_secs(1)))
        .await
        .expect("Failed to close");
    server.close(None).await.expect("Second close should be a no-op");

    expect_close_then_eof(client).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_close_sends_close_notify() {
    let (server, client) = handshake().await;
    let client = MessageConnection::new(client);

    client.write(b"over tls".to_vec()).await.expect("Failed to write");
    client.close(None).await.expect("Failed to close");

    let mut server = server;
    let received = timeout(Duration::from_secs(2), server.next())
        .await
        .expect("No message received")
        .expect("Stream ended")
        .expect("Failed to receive message");
    assert_eq!(received, Message::Binary(b"over tls".to_vec()));

    expect_close_then_eof(server).await;
}
