use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SessionError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Events pushed by an open transport, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame (the client ignores these)
    Binary(Vec<u8>),
    /// Peer or network closed the connection
    Closed(String),
    /// Low-level I/O fault; the connection is unusable afterwards
    Error(String),
}

impl TransportEvent {
    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportEvent::Closed(_) | TransportEvent::Error(_))
    }
}

/// Ordered, reliable duplex connection to a room
///
/// `open` resolving successfully is the "open" event; everything after that
/// arrives on the returned receiver.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Open the connection
    async fn open(&mut self, url: &Url) -> Result<mpsc::Receiver<TransportEvent>, SessionError>;

    /// Send one binary frame
    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), SessionError>;

    /// Close the connection. Safe to call when not open.
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

/// WebSocket transport
#[derive(Default)]
pub struct WsTransport {
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn open(&mut self, url: &Url) -> Result<mpsc::Receiver<TransportEvent>, SessionError> {
        info!("Connecting to {}", url);

        let (ws_stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::TransportOpenFailed(e.to_string()))?;

        info!("WebSocket open (HTTP {})", response.status());

        let (sink, mut stream) = ws_stream.split();
        let (event_tx, event_rx) = mpsc::channel(100);

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Text(text.as_str().to_owned()),
                    Ok(Message::Binary(data)) => TransportEvent::Binary(data.to_vec()),
                    Ok(Message::Close(frame)) => TransportEvent::Closed(
                        frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                            .unwrap_or_else(|| "closed by peer".to_string()),
                    ),
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                    Err(e) => TransportEvent::Error(e.to_string()),
                };

                let terminal = event.is_terminal();
                if event_tx.send(event).await.is_err() {
                    debug!("Transport event receiver dropped");
                    return;
                }
                if terminal {
                    return;
                }
            }

            let _ = event_tx
                .send(TransportEvent::Closed("connection ended".to_string()))
                .await;
        });

        self.sink = Some(sink);
        self.reader = Some(reader);

        Ok(event_rx)
    }

    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), SessionError> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| SessionError::TransportError("transport not open".to_string()))?;

        sink.send(Message::Binary(payload.into()))
            .await
            .map_err(|e| SessionError::TransportError(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let result = match self.sink.take() {
            Some(mut sink) => {
                info!("Closing WebSocket");
                sink.close()
                    .await
                    .map_err(|e| SessionError::TransportError(e.to_string()))
            }
            None => Ok(()),
        };

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        if let Err(e) = &result {
            warn!("WebSocket close failed: {}", e);
        }

        result
    }

    fn name(&self) -> &str {
        "WebSocket"
    }
}
