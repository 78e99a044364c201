//! Media server WebSocket connection.
//!
//! The connection is split into a writer task fed by an unbounded channel and a reader task that
//! turns frames into [`SocketEvent`]s. Heartbeat traffic is answered and filtered in the reader,
//! so consumers only ever see payload messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::core::media::heartbeat::HeartbeatKeeper;

/// Payload of a socket frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl SocketMessage {
    /// Payload bytes regardless of frame type
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SocketMessage::Text(text) => text.as_bytes(),
            SocketMessage::Binary(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(SocketMessage),
    Closed,
}

/// Sending side of an open (or closed) socket.
pub trait SocketSender: Send + Sync {
    fn is_open(&self) -> bool;

    /// Queue `message`. Returns `false` without sending when the socket is not open.
    fn send(&self, message: SocketMessage) -> bool;

    fn close(&self);
}

/// Cloneable handle to a connected media socket.
#[derive(Clone)]
pub struct SocketHandle {
    url: Url,
    sender: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl SocketHandle {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl SocketSender for SocketHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, message: SocketMessage) -> bool {
        if !self.is_open() {
            debug!("Socket {} is not open, message skipped", self.url);
            return false;
        }
        let frame = match message {
            SocketMessage::Text(text) => Message::Text(text),
            SocketMessage::Binary(bytes) => Message::Binary(bytes),
        };
        if self.sender.send(frame).is_err() {
            self.open.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!("Closing socket {}", self.url);
            let _ = self.sender.send(Message::Close(None));
        }
    }
}

/// Connect to `url` and keep the connection alive with a heartbeat every `heartbeat_interval`.
///
/// Returns the send handle and the stream of inbound events; the stream ends with
/// [`SocketEvent::Closed`].
pub async fn connect(
    url: &Url,
    heartbeat_interval: Duration,
) -> Result<(Arc<SocketHandle>, mpsc::UnboundedReceiver<SocketEvent>)> {
    info!("Connecting to media server: {}", url);
    let (ws_stream, _response) = connect_async(url.as_str()).await?;
    info!("WebSocket connected to: {}", url);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<SocketEvent>();

    let handle = Arc::new(SocketHandle {
        url: url.clone(),
        sender: tx,
        open: Arc::new(AtomicBool::new(true)),
    });

    // Spawn sender task
    let open_flag = handle.open.clone();
    let url_sender = url.clone();
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = ws_sender.send(message).await {
                error!("Failed to send message to {}: {}", url_sender, e);
                open_flag.store(false, Ordering::SeqCst);
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Spawn receiver task
    let keeper = HeartbeatKeeper::attach(handle.clone(), heartbeat_interval);
    keeper.on_open();
    let open_flag = handle.open.clone();
    let url_receiver = url.clone();
    tokio::spawn(async move {
        while let Some(message_result) = ws_receiver.next().await {
            let message = match message_result {
                Ok(Message::Text(text)) => SocketMessage::Text(text),
                Ok(Message::Binary(bytes)) => SocketMessage::Binary(bytes),
                Ok(Message::Close(_)) => {
                    info!("Media server {} closed connection", url_receiver);
                    break;
                }
                Err(e) => {
                    warn!("WebSocket error from {}: {}", url_receiver, e);
                    break;
                }
                _ => continue,
            };
            if keeper.on_message(&message) {
                continue;
            }
            if event_tx.send(SocketEvent::Message(message)).is_err() {
                debug!("Event receiver for {} dropped", url_receiver);
            }
        }

        open_flag.store(false, Ordering::SeqCst);
        keeper.on_close();
        let _ = event_tx.send(SocketEvent::Closed);
        info!("Disconnected from media server: {}", url_receiver);
    });

    Ok((handle, event_rx))
}
