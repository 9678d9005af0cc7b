//! Push Channel
//!
//! Manages the real-time connection for one conversation with automatic
//! reconnection. Incoming server events are handed to the owner over an
//! mpsc channel; delivery semantics (dedup, gating) live upstream in the
//! delivery synchronizer, not here.

use std::sync::Arc;
use std::time::Duration;

use el_common::protocol::{ClientEvent, ServerEvent};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

/// Push channel for one conversation.
pub struct PushChannel {
    /// Connection status.
    status: Arc<RwLock<ConnectionStatus>>,
    /// Handle for shutdown.
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl PushChannel {
    /// Open the push channel for a conversation and start the connection
    /// task. Server events arrive on the returned receiver; the receiver
    /// sees nothing more after [`disconnect`](Self::disconnect).
    pub fn connect(
        config: ClientConfig,
        conversation_id: Uuid,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (delivery_tx, delivery_rx) = mpsc::channel::<ServerEvent>(100);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let status = Arc::new(RwLock::new(ConnectionStatus::Connecting));

        let status_clone = status.clone();
        tokio::spawn(async move {
            connection_loop(config, conversation_id, delivery_tx, shutdown_rx, status_clone)
                .await;
        });

        (
            Self {
                status,
                shutdown_tx: Some(shutdown_tx),
            },
            delivery_rx,
        )
    }

    /// Get the current connection status.
    pub async fn status(&self) -> ConnectionStatus {
        self.status.read().await.clone()
    }

    /// Disconnect from the server.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }
}

/// Main connection loop with reconnection logic.
async fn connection_loop(
    config: ClientConfig,
    conversation_id: Uuid,
    delivery_tx: mpsc::Sender<ServerEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
    status: Arc<RwLock<ConnectionStatus>>,
) {
    let mut attempt = 0u32;
    let max_backoff = Duration::from_secs(30);
    let keepalive_period = Duration::from_secs(30);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!("Push channel shutdown requested");
            *status.write().await = ConnectionStatus::Disconnected;
            return;
        }

        let ws_url = config.ws_url(conversation_id);
        info!(
            "Connecting push channel: {}",
            ws_url.split('?').next().unwrap_or(&ws_url)
        );

        if attempt > 0 {
            *status.write().await = ConnectionStatus::Reconnecting { attempt };
        } else {
            *status.write().await = ConnectionStatus::Connecting;
        }

        match connect_async(&ws_url).await {
            Ok((ws_stream, _)) => {
                info!("Push channel connected");
                attempt = 0;
                *status.write().await = ConnectionStatus::Connected;

                let (mut write, mut read) = ws_stream.split();

                // First tick completes immediately; a ping right after the
                // handshake is harmless.
                let mut keepalive = tokio::time::interval(keepalive_period);

                loop {
                    tokio::select! {
                        _ = keepalive.tick() => {
                            if let Ok(json) = serde_json::to_string(&ClientEvent::Ping) {
                                if let Err(e) = write.send(Message::Text(json.into())).await {
                                    error!("Failed to send keepalive: {}", e);
                                    break;
                                }
                            }
                        }

                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    handle_server_message(&delivery_tx, &text).await;
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    if let Err(e) = write.send(Message::Pong(data)).await {
                                        warn!("Failed to send pong: {}", e);
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    info!("Server closed connection");
                                    break;
                                }
                                Some(Err(e)) => {
                                    error!("Push channel error: {}", e);
                                    break;
                                }
                                None => {
                                    info!("Push channel stream ended");
                                    break;
                                }
                                _ => {} // Ignore other message types
                            }
                        }

                        _ = shutdown_rx.recv() => {
                            info!("Shutdown received during connection");
                            let _ = write.send(Message::Close(None)).await;
                            *status.write().await = ConnectionStatus::Disconnected;
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
            }
        }

        // Connection lost or failed - attempt reconnection
        *status.write().await = ConnectionStatus::Disconnected;

        attempt += 1;
        let backoff = std::cmp::min(Duration::from_secs(2u64.pow(attempt.min(5))), max_backoff);
        info!("Reconnecting in {:?} (attempt {})", backoff, attempt);

        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            _ = shutdown_rx.recv() => {
                info!("Shutdown during reconnect backoff");
                return;
            }
        }
    }
}

/// Forward a parsed server event to the owner.
async fn handle_server_message(delivery_tx: &mpsc::Sender<ServerEvent>, text: &str) {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => {
            debug!("Received: {:?}", event);
            if delivery_tx.send(event).await.is_err() {
                debug!("Delivery receiver dropped; event discarded");
            }
        }
        Err(e) => {
            warn!("Failed to parse server message: {} - {}", e, text);
        }
    }
}
