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

//! Integration tests for WebSocket message connections.
//!
//! These tests verify message connection behavior including:
//! - Binary message exchange and package counters
//! - Ping/pong keepalive handling and activity tracking
//! - Close frames in both directions
//! - Per-message compression, including peers that do not compress
//! - Read deadlines under steady control traffic

use futures_util::{SinkExt, StreamExt};
use polyconn::{CompressType, Connection, ConnectionConfig, MessageConnection, TransportError};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Performs a WebSocket handshake over loopback.
///
/// Returns the server side and the client side as raw WebSocket streams.
async fn handshake() -> (WebSocketStream<TcpStream>, WebSocketStream<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get listener address");

    let server = async {
        let (stream, _) = listener.accept().await.expect("Failed to accept connection");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("Failed to accept WebSocket")
    };
    let client = async {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let (ws, _) = tokio_tungstenite::client_async(format!("ws://{}/", addr), stream)
            .await
            .expect("Failed to perform client handshake");
        ws
    };

    tokio::join!(server, client)
}

/// Waits until the connection reports activity after `since`.
async fn wait_for_activity(conn: &MessageConnection, since: std::time::Instant) {
    timeout(Duration::from_secs(2), async {
        while conn.get_active() <= since {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Activity timestamp was not updated");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_message_exchange() {
    let (server, client) = handshake().await;
    let server = MessageConnection::new(server);
    let client = MessageConnection::new(client);

    let messages: Vec<Vec<u8>> = vec![b"one".to_vec(), vec![0u8; 1000], b"three".to_vec()];
    for message in &messages {
        let written = client.write(message.clone()).await.expect("Failed to write");
        assert_eq!(written, message.len());
    }

    for message in &messages {
        let received = timeout(Duration::from_secs(2), server.read())
            .await
            .expect("Read timed out")
            .expect("Failed to read");
        assert_eq!(&received, message);
    }

    assert_eq!(client.stats().write_bytes, 1008);
    assert_eq!(server.stats().read_packages, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_text_messages_are_returned_as_bytes() {
    let (server, mut client) = handshake().await;
    let server = MessageConnection::new(server);

    client
        .send(Message::Text("hello".to_string()))
        .await
        .expect("Failed to send text");

    assert_eq!(server.read().await.expect("Failed to read"), b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ping_is_answered_with_same_payload() {
    let (server, mut client) = handshake().await;
    let server = Arc::new(MessageConnection::new(server));
    let before = server.get_active();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let reader = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.read().await })
    };

    client
        .send(Message::Ping(b"x".to_vec()))
        .await
        .expect("Failed to send ping");

    let reply = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("No pong received")
        .expect("Stream ended")
        .expect("Failed to receive pong");
    assert_eq!(reply, Message::Pong(b"x".to_vec()));
    wait_for_activity(&server, before).await;

    // The ping did not end the read; the next data message does.
    client
        .send(Message::Binary(b"done".to_vec()))
        .await
        .expect("Failed to send");
    let received = reader.await.expect("Reader panicked").expect("Failed to read");
    assert_eq!(received, b"done");
    assert_eq!(server.stats().read_packages, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pong_updates_activity_without_reply() {
    let (server, mut client) = handshake().await;
    let server = MessageConnection::new(server);
    let before = server.get_active();
    tokio::time::sleep(Duration::from_millis(10)).await;

    client
        .send(Message::Pong(Vec::new()))
        .await
        .expect("Failed to send pong");
    client
        .send(Message::Binary(b"after".to_vec()))
        .await
        .expect("Failed to send");

    assert_eq!(server.read().await.expect("Failed to read"), b"after");
    assert!(server.get_active() > before);

    // Nothing was sent back in response to the pong.
    let nothing = timeout(Duration::from_millis(100), client.next()).await;
    assert!(nothing.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_ping_sends_empty_ping() {
    let (server, mut client) = handshake().await;
    let server = MessageConnection::new(server);

    server.write_ping().await.expect("Failed to send ping");

    let received = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("No ping received")
        .expect("Stream ended")
        .expect("Failed to receive ping");
    assert_eq!(received, Message::Ping(Vec::new()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_sends_close_frame() {
    let (server, mut client) = handshake().await;
    let server = MessageConnection::new(server);

    server
        .close(Some(Duration::from_secs(1)))
        .await
        .expect("Failed to close");
    server.close(None).await.expect("Second close should be a no-op");

    let received = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("No close frame received")
        .expect("Stream ended")
        .expect("Failed to receive close frame");

    match received {
        Message::Close(Some(frame)) => {
            assert_eq!(frame.code, CloseCode::Normal);
            assert_eq!(frame.reason, "bye-bye!!!");
        }
        other => panic!("expected close frame, got {:?}", other),
    }

    assert!(matches!(server.read().await, Err(TransportError::Closed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_peer_close_is_connection_lost() {
    let (server, mut client) = handshake().await;
    let server = MessageConnection::new(server);

    client
        .close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: Cow::Borrowed("going away"),
        }))
        .await
        .expect("Failed to close client");

    let error = timeout(Duration::from_secs(2), server.read())
        .await
        .expect("Read timed out")
        .unwrap_err();
    assert!(matches!(error, TransportError::ConnectionLost { .. }));
    assert!(error.should_close_transport());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_per_message_compression() {
    let (server, client) = handshake().await;
    let mut server = MessageConnection::new(server);
    let mut client = MessageConnection::new(client);
    server.set_compress_type(CompressType::BestCompression).unwrap();
    client.set_compress_type(CompressType::BestCompression).unwrap();

    let message = b"compressible ".repeat(500);
    client.write(message.clone()).await.expect("Failed to write");

    let received = server.read().await.expect("Failed to read");
    assert_eq!(received, message);
    // The byte counter reflects the uncompressed payload.
    assert_eq!(client.stats().write_bytes as usize, message.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snappy_rejected_for_messages() {
    let (server, _client) = handshake().await;
    let mut server = MessageConnection::new(server);

    let error = server.set_compress_type(CompressType::Snappy).unwrap_err();
    assert!(matches!(error, TransportError::InvalidConfiguration { .. }));
    assert_eq!(server.compress_type(), CompressType::None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_deadline_elapses() {
    let (server, _client) = handshake().await;
    let server = MessageConnection::new(server);
    server.set_read_deadline(Duration::from_millis(50));

    let error = server.read().await.unwrap_err();
    assert!(matches!(error, TransportError::Timeout { .. }));
    assert_eq!(server.write_deadline(), Duration::from_millis(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_deadline_holds_under_ping_traffic() {
    let (server, mut client) = handshake().await;
    let server = MessageConnection::new(server);
    server.set_read_deadline(Duration::from_millis(200));

    // Pings arrive well inside every quarter of the deadline.
    let pinger = tokio::spawn(async move {
        for _ in 0..25 {
            if client.send(Message::Ping(b"keepalive".to_vec())).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(60)).await;
        }
        client
    });

    let started = std::time::Instant::now();
    let error = timeout(Duration::from_secs(5), server.read())
        .await
        .expect("Read never returned")
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(error, TransportError::Timeout { .. }));
    assert!(
        elapsed < Duration::from_millis(600),
        "read blocked for {:?} against a 200ms deadline",
        elapsed
    );
    drop(pinger.await.expect("Pinger panicked"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_compressing_side_reads_uncompressed_peer() {
    let (server, mut client) = handshake().await;
    let mut server = MessageConnection::new(server);
    server.set_compress_type(CompressType::Zip).unwrap();

    client
        .send(Message::Binary(b"plain hello".to_vec()))
        .await
        .expect("Failed to send");
    assert_eq!(server.read().await.expect("Failed to read"), b"plain hello");

    // Outbound traffic from the compressing side is still deflated.
    server.write(b"compressed reply".to_vec()).await.expect("Failed to write");
    let reply = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("No reply received")
        .expect("Stream ended")
        .expect("Failed to receive reply");
    match reply {
        Message::Binary(data) => assert_ne!(data, b"compressed reply"),
        other => panic!("expected binary message, got {:?}", other),
    }
    assert_eq!(server.stats().read_packages, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_inflated_message_length_is_limited() {
    let (server, client) = handshake().await;
    let mut server = MessageConnection::new(server);
    let mut client = MessageConnection::new(client);

    let config = ConnectionConfig::default()
        .with_compression(CompressType::Zip)
        .with_max_message_length(1024 * 1024);
    config
        .apply_message(&mut server)
        .expect("Failed to apply configuration");
    client.set_compress_type(CompressType::BestCompression).unwrap();

    // Four megabytes of zeros deflate to a few kilobytes on the wire.
    client
        .write(vec![0u8; 4 * 1024 * 1024])
        .await
        .expect("Failed to write");

    let error = timeout(Duration::from_secs(5), server.read())
        .await
        .expect("Read timed out")
        .unwrap_err();
    match error {
        TransportError::ReadFailed { source } => {
            assert_eq!(source.kind(), std::io::ErrorKind::InvalidData)
        }
        other => panic!("expected ReadFailed, got {:?}", other),
    }
    assert_eq!(server.stats().read_packages, 0);
}
