/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 16/10/26
******************************************************************************/

use super::error::{FeedError, FeedResult};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Largest inbound message accepted without failing the session.
///
/// Order book snapshots can run to several megabytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One inbound text payload. An empty frame carries nothing and should be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame(String);

impl Frame {
    /// A frame with no payload, produced for control messages.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The frame text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the frame, returning its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

/// A single WebSocket session with the feed.
///
/// The session is owned exclusively by whoever holds the connection. Any transport
/// failure drops the stream, after which the connection reports itself closed and
/// must be connected again.
#[derive(Debug, Default)]
pub struct FeedConnection {
    stream: Option<FeedStream>,
}

impl FeedConnection {
    /// Creates a closed connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a session is currently established.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the WebSocket session to `endpoint`.
    ///
    /// An already open session is closed before connecting. Inbound messages and
    /// frames are limited to `MAX_MESSAGE_SIZE`.
    ///
    /// # Arguments
    ///
    /// * `endpoint`: The `ws://` or `wss://` address of the feed.
    /// * `cancel`: Aborts the attempt when it fires.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the handshake completes, `FeedError::Connect` if the transport
    /// cannot be established, or `FeedError::Cancelled` if `cancel` fires first.
    pub async fn connect(&mut self, endpoint: &str, cancel: &CancellationToken) -> FeedResult<()> {
        self.close().await;
        debug!("Connecting to feed at: {}", endpoint);

        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(MAX_MESSAGE_SIZE);
        config.max_frame_size = Some(MAX_MESSAGE_SIZE);

        let (stream, _) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FeedError::Cancelled),
            result = connect_async_with_config(endpoint, Some(config), false) => {
                result.map_err(|e| FeedError::Connect(format!("Failed to connect: {}", e)))?
            }
        };

        debug!("Feed connection established");
        self.stream = Some(stream);
        Ok(())
    }

    /// Serializes `message` as JSON and sends it as one text frame.
    ///
    /// # Arguments
    ///
    /// * `message`: Any serializable value, typically a `SubscribeRequest`.
    ///
    /// # Returns
    ///
    /// `FeedError::Transport` if serialization or the write fails, or if the
    /// connection is not open.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> FeedResult<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| FeedError::Transport(format!("Failed to serialize message: {}", e)))?;
        self.send_text(json).await
    }

    /// Sends a complete text frame.
    pub async fn send_text(&mut self, text: String) -> FeedResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(FeedError::Transport("Connection is not open".to_string()));
        };

        debug!("Sending message: {}", text);
        let result = stream.send(Message::Text(text.into())).await;
        if let Err(e) = result {
            error!("Failed to send message: {}", e);
            self.stream = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Waits for the next inbound frame.
    ///
    /// Control frames yield an empty `Frame`. A close frame, a read error or the end
    /// of the stream yield `FeedError::Transport` and leave the connection closed.
    /// Returns `FeedError::Cancelled` if `cancel` fires while waiting.
    pub async fn receive_one(&mut self, cancel: &CancellationToken) -> FeedResult<Frame> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(FeedError::Transport("Connection is not open".to_string()));
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FeedError::Cancelled),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                trace!("Received message: {}", text);
                Ok(Frame(text.to_string()))
            }
            Some(Ok(Message::Binary(data))) => {
                trace!("Received binary message of {} bytes", data.len());
                Ok(Frame(String::from_utf8_lossy(&data).into_owned()))
            }
            Some(Ok(Message::Close(frame))) => {
                debug!("Feed closed the connection: {:?}", frame);
                self.stream = None;
                Err(FeedError::Transport(
                    "Connection closed by remote".to_string(),
                ))
            }
            Some(Ok(message)) => {
                trace!("Received control message: {:?}", message);
                Ok(Frame::empty())
            }
            Some(Err(e)) => {
                error!("WebSocket error: {}", e);
                self.stream = None;
                Err(e.into())
            }
            None => {
                error!("WebSocket connection closed unexpectedly");
                self.stream = None;
                Err(FeedError::Transport(
                    "Connection closed unexpectedly".to_string(),
                ))
            }
        }
    }

    /// Releases the session. Safe to call on a closed or never opened connection.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("Error while closing feed connection: {}", e);
            }
        }
    }
}
