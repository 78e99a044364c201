//! Socket keepalive.
//!
//! While a socket is open a `ping` goes out every interval as bytes. A text `ping` from the server
//! is answered with `pong`, also as bytes. The ticker stops when the socket closes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

use crate::core::media::socket::{SocketMessage, SocketSender};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(10_000);
pub const PING: &str = "ping";
pub const PONG: &str = "pong";

pub struct HeartbeatKeeper<S: SocketSender + 'static> {
    socket: Arc<S>,
    interval: Duration,
    ticker: Mutex<Option<CancellationToken>>,
}

impl<S: SocketSender + 'static> HeartbeatKeeper<S> {
    pub fn attach(socket: Arc<S>, interval: Duration) -> Self {
        Self {
            socket,
            interval,
            ticker: Mutex::new(None),
        }
    }

    /// Start the ping ticker. Calling it again while running does nothing.
    pub fn on_open(&self) {
        let Ok(mut ticker) = self.ticker.lock() else {
            return;
        };
        if ticker.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let socket = self.socket.clone();
        let period = self.interval;
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        if socket.is_open() {
                            socket.send(SocketMessage::Binary(PING.as_bytes().to_vec()));
                        }
                    }
                }
            }
            debug!("Heartbeat stopped");
        });
        *ticker = Some(token);
    }

    /// Returns `true` if `message` was heartbeat traffic and has been handled.
    pub fn on_message(&self, message: &SocketMessage) -> bool {
        match message {
            SocketMessage::Text(text) if text == PING => {
                if self.socket.is_open() {
                    self.socket.send(SocketMessage::Binary(PONG.as_bytes().to_vec()));
                }
                true
            }
            SocketMessage::Text(text) if text == PONG => {
                debug!("Received pong");
                true
            }
            // a peer's own heartbeat; never answered, never payload
            SocketMessage::Binary(bytes) if bytes == PING.as_bytes() || bytes == PONG.as_bytes() => {
                true
            }
            _ => false,
        }
    }

    /// Stop the ticker; safe to call more than once.
    pub fn on_close(&self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(token) = ticker.take() {
                token.cancel();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.lock().map(|t| t.is_some()).unwrap_or(false)
    }
}

impl<S: SocketSender + 'static> Drop for HeartbeatKeeper<S> {
    fn drop(&mut self) {
        self.on_close();
    }
}
