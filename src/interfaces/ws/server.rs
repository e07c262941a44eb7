//! WebSocket server — the socket-accepting edge of the hub
//!
//! Accepts transport connections, frames inbound/outbound messages as JSON
//! text, and forwards everything as events into the hub queue. Parse
//! failures are silent drops; outbound delivery runs through a per-connection
//! writer task so one slow socket never stalls another.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::hub::HubHandle;
use crate::config::ServerConfig;
use crate::domain::HubResult;
use crate::protocol::InboundMessage;
use crate::shared::ShutdownSignal;

/// Telemetry WebSocket server
pub struct TelemetryServer {
    addr: String,
    hub: HubHandle,
    shutdown_signal: Option<ShutdownSignal>,
}

impl TelemetryServer {
    pub fn new(config: &ServerConfig, hub: HubHandle) -> Self {
        Self {
            addr: config.ws_address(),
            hub,
            shutdown_signal: None,
        }
    }

    /// Set the shutdown signal for graceful shutdown
    pub fn with_shutdown(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_signal = Some(signal);
        self
    }

    /// Start the WebSocket server
    pub async fn run(&self) -> HubResult<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!("🔌 Telemetry hub listening on ws://{}", self.addr);

        if let Some(ref shutdown) = self.shutdown_signal {
            self.run_with_shutdown(listener, shutdown.clone()).await
        } else {
            self.run_loop(listener).await
        }
    }

    async fn run_loop(&self, listener: TcpListener) -> HubResult<()> {
        while let Ok((stream, addr)) = listener.accept().await {
            self.spawn_connection(stream, addr);
        }
        Ok(())
    }

    async fn run_with_shutdown(
        &self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> HubResult<()> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                }
                _ = shutdown.notified().wait() => {
                    info!("🛑 WebSocket server received shutdown signal");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let hub = self.hub.clone();
        let shutdown = self.shutdown_signal.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, hub, shutdown).await {
                debug!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection for its whole lifetime.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub: HubHandle,
    shutdown: Option<ShutdownSignal>,
) -> HubResult<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let connection_id = Uuid::new_v4();
    info!(%connection_id, %addr, "Connection established");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Channel drained by the writer task below; the hub only ever does
    // fire-and-forget sends into it.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    hub.connected(connection_id, tx);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(Message::Text(msg)).await {
                debug!(%connection_id, "Send error: {}", e);
                break;
            }
        }
        // Channel closed (connection dropped by the hub) or transport died:
        // try to close the socket cleanly either way.
        let _ = ws_sender.close().await;
    });

    let recv_hub = hub.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match InboundMessage::parse(&text) {
                    Ok(message) => {
                        if !recv_hub.inbound(connection_id, message) {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(%connection_id, "Dropping malformed frame: {}", e);
                        counter!("hub_dropped_frames_total").increment(1);
                    }
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Pong replies are handled by the transport.
                }
                Ok(Message::Close(frame)) => {
                    debug!(%connection_id, "Close frame received: {:?}", frame);
                    break;
                }
                Ok(Message::Binary(data)) => {
                    warn!(%connection_id, "Binary message received ({} bytes), ignoring", data.len());
                }
                Ok(Message::Frame(_)) => {
                    // Raw frame, ignore
                }
                Err(e) => {
                    debug!(%connection_id, "WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    if let Some(shutdown) = shutdown {
        tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
            _ = shutdown.notified().wait() => {
                debug!(%connection_id, "Connection closing due to server shutdown");
            }
        }
    } else {
        tokio::select! {
            _ = send_task => {},
            _ = recv_task => {},
        }
    }

    hub.transport_closed(connection_id);
    info!(%connection_id, "Disconnected");

    Ok(())
}
