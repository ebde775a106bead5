//! WebSocket control server.
//!
//! Carries [`ControlRequest`]/[`ControlReply`] JSON text messages between
//! an external controller and the [`ControlSurface`]. Any number of
//! controllers may be connected; each message gets exactly one reply.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::{from_str, to_string};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{ControlReply, ControlRequest};

use super::ControlSurface;

// ============================================================================
// ControlServer
// ============================================================================

/// A bound control WebSocket server.
///
/// # Example
///
/// ```ignore
/// let server = ControlServer::bind("127.0.0.1:12346".parse()?).await?;
/// println!("control at {}", server.ws_url());
/// tokio::spawn(server.serve(Arc::new(surface)));
/// ```
pub struct ControlServer {
    /// TCP listener for controller connections.
    listener: TcpListener,
    /// Address actually bound.
    local_addr: SocketAddr,
}

impl ControlServer {
    /// Binds the control server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "Control server bound");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Accepts controllers forever.
    pub async fn serve(self, surface: Arc<ControlSurface>) {
        info!(url = %self.ws_url(), "Control server started");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let surface = Arc::clone(&surface);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, addr, &surface).await {
                            warn!(error = %e, ?addr, "Control connection failed");
                        }
                    });
                }

                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }
    }

    /// Serves one controller until it disconnects.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        surface: &ControlSurface,
    ) -> Result<()> {
        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        debug!(?addr, "Controller connected");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        while let Some(message) = ws_read.next().await {
            match message? {
                Message::Text(text) => {
                    let reply = Self::handle_text(&text, surface);
                    ws_write.send(Message::Text(to_string(&reply)?.into())).await?;
                }

                Message::Close(_) => {
                    debug!(?addr, "Controller closed connection");
                    break;
                }

                // Ignore Binary, Ping, Pong
                _ => {}
            }
        }

        Ok(())
    }

    /// Parses and handles one text message.
    fn handle_text(text: &str, surface: &ControlSurface) -> ControlReply {
        match from_str::<ControlRequest>(text) {
            Ok(request) => surface.handle(request),
            Err(e) => {
                warn!(error = %e, "Malformed control request");
                ControlReply::error(format!("Malformed request: {e}"))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
