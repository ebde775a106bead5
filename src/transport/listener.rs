//! Guest channel listener.
//!
//! Accepts connection-oriented channels from guest agents and starts a
//! [`Session`] for each one.
//!
//! # Connection Flow
//!
//! 1. Host binds the listener (configurable address)
//! 2. Guest agent connects
//! 3. A session is spawned and becomes the registry's current session
//! 4. Guest sends query frames; host answers on the same channel
//! 5. On any fatal channel condition the session closes; the guest reconnects

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::SessionOptions;
use crate::dispatch::Dispatcher;
use crate::error::Result;

use super::{Session, SessionRegistry};

// ============================================================================
// GuestListener
// ============================================================================

/// A bound guest channel listener.
///
/// # Example
///
/// ```ignore
/// let listener = GuestListener::bind("0.0.0.0:12345".parse()?).await?;
/// tokio::spawn(listener.serve(dispatcher, registry, SessionOptions::new()));
/// ```
pub struct GuestListener {
    /// TCP listener for incoming channels.
    listener: TcpListener,
    /// Address actually bound.
    local_addr: SocketAddr,
}

impl GuestListener {
    /// Binds the listener.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "Guest listener bound");

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

    /// Accepts channels forever, one session per channel.
    ///
    /// Accept failures are logged and do not stop the loop.
    pub async fn serve(
        self,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<SessionRegistry>,
        options: SessionOptions,
    ) {
        info!(addr = %self.local_addr, "Listening for guest channels");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "New guest channel");

                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
                    }

                    Session::spawn(
                        stream,
                        peer.to_string(),
                        Arc::clone(&dispatcher),
                        Arc::clone(&registry),
                        options,
                    );
                }

                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use crate::config::HostConfig;
    use crate::protocol::{Command, FRAME_SIZE, Frame};

    async fn bound() -> GuestListener {
        GuestListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind should succeed")
    }

    async fn wait_for(registry: &SessionRegistry, count: usize) {
        for _ in 0..200 {
            if registry.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {count} sessions");
    }

    #[tokio::test]
    async fn test_bind_random_port() {
        let listener = bound().await;
        assert!(listener.local_addr().port() > 0);
        assert_eq!(listener.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_serve_answers_over_tcp() {
        let listener = bound().await;
        let addr = listener.local_addr();
        let dispatcher = Arc::new(Dispatcher::standard(Arc::new(HostConfig::default())));
        let registry = Arc::new(SessionRegistry::new());
        tokio::spawn(listener.serve(dispatcher, Arc::clone(&registry), SessionOptions::new()));

        let mut guest = TcpStream::connect(addr).await.expect("connect");
        wait_for(&registry, 1).await;

        let mut query = Frame::request(uuid::Uuid::nil(), Command::GuestUuid.id(), 0);
        query.header.need_response = 1;
        guest
            .write_all(&query.encode().expect("encode"))
            .await
            .expect("write");

        let mut buf = vec![0u8; FRAME_SIZE];
        guest.read_exact(&mut buf).await.expect("read");
        let response = Frame::decode(&buf).expect("decode");
        assert_eq!(response.payload_text(), "ba13a19a-c0c1-4fef-9346-915ed3b98341");

        drop(guest);
        wait_for(&registry, 0).await;
    }
}
