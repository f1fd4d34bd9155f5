use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{error, info, warn};

use super::{ChatEvent, Endpoints};
use crate::chat::Message;
use crate::error::ConnectionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to the background connection task.
///
/// Dropping the handle closes the socket.
pub struct ChatClient {
    outgoing_tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
}

impl ChatClient {
    /// Spawn the connection task and return immediately; progress arrives on `event_tx`.
    pub fn start(endpoints: Endpoints, event_tx: mpsc::UnboundedSender<ChatEvent>) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_session(endpoints, event_tx, outgoing_rx, connected.clone()));

        Self {
            outgoing_tx,
            connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn send(&self, message: &Message) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let text = message.to_json()?;
        self.outgoing_tx
            .send(text)
            .map_err(|_| ConnectionError::NotConnected)
    }
}

async fn connect_once(url: &str) -> Result<WsStream, ConnectionError> {
    info!(%url, "Attempting to connect");
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|source| ConnectionError::Connect {
            url: url.to_string(),
            source,
        })?;
    info!(%url, "Connected");
    Ok(stream)
}

/// Connect to the primary server, trying the fallback exactly once if that fails.
///
/// `on_attempt` is called with each url before it is tried.
pub async fn connect_with_fallback(
    endpoints: &Endpoints,
    mut on_attempt: impl FnMut(&str),
) -> Result<(WsStream, String), ConnectionError> {
    let primary = endpoints.primary_url();
    on_attempt(&primary);
    let primary_err = match connect_once(&primary).await {
        Ok(stream) => return Ok((stream, primary)),
        Err(e) => e,
    };
    error!(error = %primary_err, "WebSocket error connecting to primary server");

    let Some(fallback) = endpoints.fallback_url() else {
        return Err(primary_err);
    };

    on_attempt(&fallback);
    match connect_once(&fallback).await {
        Ok(stream) => Ok((stream, fallback)),
        Err(e) => {
            error!(error = %e, "Failed to connect to both primary and fallback servers");
            Err(ConnectionError::BothFailed { primary, fallback })
        }
    }
}

async fn run_session(
    endpoints: Endpoints,
    event_tx: mpsc::UnboundedSender<ChatEvent>,
    mut outgoing_rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
) {
    let result = connect_with_fallback(&endpoints, |url| {
        let _ = event_tx.send(ChatEvent::Connecting(url.to_string()));
    })
    .await;

    let (stream, url) = match result {
        Ok(ok) => ok,
        Err(e) => {
            let _ = event_tx.send(ChatEvent::ConnectFailed(e.to_string()));
            return;
        }
    };

    connected.store(true, Ordering::SeqCst);
    let _ = event_tx.send(ChatEvent::Connected(url.clone()));

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match Message::from_json(&text) {
                    Ok(message) => {
                        let _ = event_tx.send(ChatEvent::Message(message));
                    }
                    Err(e) => warn!(error = %e, "Dropping malformed chat frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    info!(?frame, "Server closed the connection");
                    // Flushes the queued close reply.
                    if let Err(e) = write.close().await {
                        warn!(error = %e, "Failed to acknowledge close");
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read error");
                    break;
                }
                None => break,
            },
            outgoing = outgoing_rx.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        warn!(error = %e, "WebSocket send error");
                        break;
                    }
                }
                // Handle dropped
                None => {
                    if let Err(e) = write.close().await {
                        warn!(error = %e, "Failed to send close");
                    }
                    let drain = async { while let Some(Ok(_)) = read.next().await {} };
                    if timeout(CLOSE_TIMEOUT, drain).await.is_err() {
                        warn!("Server did not acknowledge close");
                    }
                    break;
                }
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    info!(%url, "WebSocket connection closed");
    let _ = event_tx.send(ChatEvent::Closed);
}
