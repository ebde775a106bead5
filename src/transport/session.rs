//! Guest channel session and read loop.
//!
//! A [`Session`] owns one accepted channel for its whole life.
//!
//! # Tasks
//!
//! Each session runs:
//!
//! - a read loop that pulls one [`FRAME_SIZE`] record at a time and decodes it
//! - one dispatch task per decoded frame, so a slow command never stalls reads
//! - a single writer task fed by a queue; every frame written to the channel
//!   goes through it, so concurrent responses never interleave on the wire
//!
//! At most [`WRITE_QUEUE_DEPTH`] frames wait for the writer. Dispatch tasks
//! wait for room; injected frames are refused with [`Error::QueueFull`].
//! The read loop stops reading while that many dispatch tasks are pending,
//! so a guest that never reads cannot grow host memory without bound.
//!
//! # Termination
//!
//! End of stream, a partial frame, a read error, a write error or an
//! exceeded deadline closes the session. An undecodable frame is dropped
//! and reading continues. The peer is expected to reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::config::SessionOptions;
use crate::dispatch::{Dispatcher, Reply};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{FRAME_SIZE, Frame};

use super::SessionRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Frames that may wait for the writer, and dispatch tasks that may be
/// pending, per session.
pub const WRITE_QUEUE_DEPTH: usize = 64;

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the writer task.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Write one encoded frame. The permit frees its queue slot once written.
    Write(Vec<u8>, OwnedSemaphorePermit),
    /// Stop writing and close the write half.
    Shutdown,
}

// ============================================================================
// Session
// ============================================================================

/// Handle to a running session.
///
/// Cheap to clone; every clone feeds the same writer task.
///
/// # Thread Safety
///
/// `Session` is `Send + Sync` and can be shared across tasks.
/// Writes are queued and never block the caller.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier.
    id: SessionId,
    /// Peer description for logging.
    peer: Arc<str>,
    /// Channel to the writer task.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Free slots in the write queue.
    write_slots: Arc<Semaphore>,
}

impl Session {
    /// Starts a session over `stream` and registers it as the active one.
    ///
    /// Spawns the read loop, which in turn spawns the writer task. The
    /// returned join handle completes once the channel is closed and the
    /// session has left the registry.
    pub fn spawn<S>(
        stream: S,
        peer: impl Into<Arc<str>>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<SessionRegistry>,
        options: SessionOptions,
    ) -> (Self, JoinHandle<()>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let session = Self {
            id: SessionId::next(),
            peer: peer.into(),
            command_tx,
            write_slots: Arc::new(Semaphore::new(WRITE_QUEUE_DEPTH)),
        };

        info!(session_id = %session.id, peer = %session.peer, "Session opened");
        registry.register(session.clone());

        let task = tokio::spawn(Self::run(
            stream,
            session.clone(),
            command_rx,
            dispatcher,
            registry,
            options,
        ));

        (session, task)
    }

    /// Builds a handle without a running session behind it.
    #[cfg(test)]
    pub(crate) fn detached(peer: &str) -> (Self, mpsc::UnboundedReceiver<SessionCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let session = Self {
            id: SessionId::next(),
            peer: peer.into(),
            command_tx,
            write_slots: Arc::new(Semaphore::new(WRITE_QUEUE_DEPTH)),
        };
        (session, command_rx)
    }

    /// Returns the session id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the peer description.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Returns `true` once the writer task has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Encodes `frame` and queues it for writing without waiting.
    ///
    /// Returns once the frame is queued, not once it is on the wire.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] if the payload does not fit
    /// - [`Error::QueueFull`] if [`WRITE_QUEUE_DEPTH`] frames are already waiting
    /// - [`Error::SessionClosed`] if the writer has stopped
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        let permit = Arc::clone(&self.write_slots)
            .try_acquire_owned()
            .map_err(|_| Error::queue_full(self.id))?;
        self.enqueue(bytes, permit)
    }

    /// Encodes `frame` and queues it, waiting for room in the queue.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] if the payload does not fit
    /// - [`Error::SessionClosed`] if the writer has stopped
    async fn queue_frame(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        let permit = Arc::clone(&self.write_slots)
            .acquire_owned()
            .await
            .map_err(|_| Error::session_closed(self.id))?;
        self.enqueue(bytes, permit)
    }

    fn enqueue(&self, bytes: Vec<u8>, permit: OwnedSemaphorePermit) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Write(bytes, permit))
            .map_err(|_| Error::session_closed(self.id))
    }

    /// Asks the writer to stop, which closes the session.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }
}

// ============================================================================
// Session - Read Loop
// ============================================================================

impl Session {
    /// Read loop. Owns the read half until the session closes.
    async fn run<S>(
        stream: S,
        session: Session,
        command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<SessionRegistry>,
        options: SessionOptions,
    ) where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let mut writer_task = tokio::spawn(Self::run_writer(
            writer,
            command_rx,
            session.id,
            options.write_timeout,
        ));
        let mut writer_stopped = false;
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                read = Self::read_frame(&mut reader, options.read_timeout) => {
                    match read {
                        Ok(Some(bytes)) => {
                            while in_flight.try_join_next().is_some() {}
                            session.handle_frame(&bytes, &dispatcher, &mut in_flight);

                            while in_flight.len() >= WRITE_QUEUE_DEPTH {
                                trace!(session_id = %session.id, "Dispatch backlog full");
                                in_flight.join_next().await;
                            }
                        }

                        Ok(None) => {
                            info!(session_id = %session.id, "Channel closed by peer");
                            break;
                        }

                        Err(e) => {
                            warn!(session_id = %session.id, error = %e, "Read failed, closing session");
                            break;
                        }
                    }
                }

                _ = &mut writer_task => {
                    writer_stopped = true;
                    debug!(session_id = %session.id, "Writer stopped, closing session");
                    break;
                }
            }
        }

        registry.unregister(session.id);

        if !writer_stopped {
            // Let queued responses reach the wire before closing.
            while in_flight.join_next().await.is_some() {}
            session.shutdown();
            let _ = writer_task.await;
        } else {
            in_flight.abort_all();
        }

        info!(session_id = %session.id, peer = %session.peer, "Session closed");
    }

    /// Reads one full frame.
    ///
    /// Returns `Ok(None)` on end of stream at a frame boundary.
    ///
    /// # Errors
    ///
    /// - [`Error::ShortRead`] if the stream ends inside a frame
    /// - [`Error::Timeout`] if the read deadline passes
    /// - [`Error::Io`] on a channel error
    async fn read_frame<R>(reader: &mut R, read_timeout: Option<Duration>) -> Result<Option<Vec<u8>>>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; FRAME_SIZE];

        let filled = match read_timeout {
            Some(limit) => timeout(limit, Self::fill(reader, &mut buf))
                .await
                .map_err(|_| Error::timeout("frame read", millis(limit)))??,
            None => Self::fill(reader, &mut buf).await?,
        };

        match filled {
            0 => Ok(None),
            FRAME_SIZE => Ok(Some(buf)),
            received => Err(Error::short_read(received, FRAME_SIZE)),
        }
    }

    /// Fills `buf` until full or end of stream. Returns bytes read.
    async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let mut filled = 0;
        while filled < buf.len() {
            let n = reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Decodes a frame and hands it to its own dispatch task.
    fn handle_frame(
        &self,
        bytes: &[u8],
        dispatcher: &Arc<Dispatcher>,
        in_flight: &mut JoinSet<()>,
    ) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Dropping undecodable frame");
                return;
            }
        };

        let session = self.clone();
        let dispatcher = Arc::clone(dispatcher);
        in_flight.spawn(async move {
            session.process_frame(frame, &dispatcher).await;
        });
    }

    /// Dispatches one frame and queues the response, if one is due.
    async fn process_frame(&self, mut frame: Frame, dispatcher: &Dispatcher) {
        let header = frame.header;
        let label = dispatcher.label(header.command_id).unwrap_or("unknown");

        info!(
            session_id = %self.id,
            command = label,
            command_id = header.command_id,
            guest_id = %header.guest_id,
            "Command received"
        );

        if !frame.payload.is_empty() {
            debug!(session_id = %self.id, info = %frame.payload_text(), "Guest payload");
        }

        let reply = match dispatcher.dispatch(header.command_id) {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                warn!(
                    session_id = %self.id,
                    command_id = header.command_id,
                    "No handler for command"
                );
                return;
            }
            Err(e) => {
                error!(
                    session_id = %self.id,
                    command_id = header.command_id,
                    error = %e,
                    "Command handler failed"
                );
                return;
            }
        };

        if !header.wants_response() {
            return;
        }

        let payload = match reply {
            Reply::Payload(text) => text.into_bytes(),
            Reply::Acknowledge => std::mem::take(&mut frame.payload),
        };

        let sent = match frame.response(payload) {
            Ok(response) => {
                debug!(
                    session_id = %self.id,
                    correlation_id = %header.correlation_id,
                    data = %response.payload_text(),
                    "Sending response"
                );
                self.queue_frame(&response).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = sent {
            warn!(
                session_id = %self.id,
                command_id = header.command_id,
                error = %e,
                "Response not sent"
            );
        }
    }
}

// ============================================================================
// Session - Writer
// ============================================================================

impl Session {
    /// Writer task: the only code that touches the write half.
    async fn run_writer<W>(
        mut writer: W,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        session_id: SessionId,
        write_timeout: Option<Duration>,
    ) where
        W: AsyncWrite + Unpin,
    {
        while let Some(command) = command_rx.recv().await {
            match command {
                SessionCommand::Write(bytes, _permit) => {
                    if let Err(e) = Self::write_frame(&mut writer, &bytes, write_timeout).await {
                        error!(session_id = %session_id, error = %e, "Write failed, closing session");
                        break;
                    }
                    trace!(session_id = %session_id, "Frame written");
                }

                SessionCommand::Shutdown => {
                    debug!(session_id = %session_id, "Shutdown command received");
                    break;
                }
            }
        }

        let _ = writer.shutdown().await;
        debug!(session_id = %session_id, "Writer terminated");
    }

    /// Writes and flushes one frame, within the deadline if any.
    async fn write_frame<W>(writer: &mut W, bytes: &[u8], write_timeout: Option<Duration>) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await?;
            Ok::<_, Error>(())
        };

        match write_timeout {
            Some(limit) => timeout(limit, write)
                .await
                .map_err(|_| Error::timeout("frame write", millis(limit)))?,
            None => write.await,
        }
    }
}

/// Deadline in whole milliseconds, saturating.
fn millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
