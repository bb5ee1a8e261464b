//! WebSocket transport.
//!
//! One text frame carries one JSON `{event, data}` envelope. The socket is
//! split after the handshake so the reader task can wait on the stream half
//! while commands go out through the sink half.

use super::{Transport, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Default)]
pub struct WebSocketTransport {
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
    connected: AtomicBool,
}

impl WebSocketTransport {
    /// Create an unconnected transport.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let (ws_stream, response) = connect_async(address).await.map_err(connect_error)?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (write_half, read_half) = ws_stream.split();
        *self.sink.lock().await = Some(write_half);
        *self.stream.lock().await = Some(read_half);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        let sink = sink.as_mut().ok_or(TransportError::NotConnected)?;

        let message = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_string()),
            Err(_) => Message::Binary(data.to_vec()),
        };
        sink.send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut stream = self.stream.lock().await;
        let stream = stream.as_mut().ok_or(TransportError::NotConnected)?;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
            };

            match message {
                Message::Text(text) => return Ok(text.into_bytes()),
                Message::Binary(bytes) => return Ok(bytes),
                Message::Close(_) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(TransportError::ConnectionClosed);
                }
                // Control frames are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);

        // The peer may already be gone, or a send may hold the sink; closing
        // is best effort and bounded.
        let closed = timeout(CLOSE_TIMEOUT, async {
            let sink = self.sink.lock().await.take();
            if let Some(mut sink) = sink {
                let _ = sink.close().await;
            }
        })
        .await;
        if closed.is_err() {
            debug!(timeout = ?CLOSE_TIMEOUT, "websocket close handshake abandoned");
        }
        self.stream.lock().await.take();
        Ok(())
    }
}

fn connect_error(error: WsError) -> TransportError {
    match error {
        WsError::Http(response) => TransportError::HandshakeRejected(response.status().as_u16()),
        WsError::Url(e) => TransportError::InvalidAddress(e.to_string()),
        other => TransportError::ConnectionFailed(other.to_string()),
    }
}
