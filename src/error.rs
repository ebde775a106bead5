//! Error types for the serial responder.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use vmm_serial::{Frame, Result};
//!
//! fn inspect(bytes: &[u8]) -> Result<i32> {
//!     let frame = Frame::decode(bytes)?;
//!     Ok(frame.header.command_id)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Framing | [`Error::Framing`], [`Error::PayloadTooLarge`], [`Error::ShortRead`] |
//! | Session | [`Error::NoActiveSession`], [`Error::SessionClosed`], [`Error::QueueFull`], [`Error::Connection`], [`Error::Timeout`] |
//! | Control | [`Error::InvalidCommand`], [`Error::NoCommandSpecified`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::SessionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a configuration value is rejected at startup.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Frame could not be decoded.
    ///
    /// Returned when the input is not exactly one frame or a header
    /// length field points outside the payload region.
    #[error("Framing error: {message}")]
    Framing {
        /// Description of the framing problem.
        message: String,
    },

    /// Payload does not fit the fixed payload region.
    #[error("Payload of {len} bytes exceeds capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
        /// Bytes available for it.
        capacity: usize,
    },

    /// Channel ended in the middle of a frame.
    #[error("Short read: received {received} of {expected} bytes")]
    ShortRead {
        /// Bytes received before end of stream.
        received: usize,
        /// Bytes required for a full frame.
        expected: usize,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No session available to receive an injected command.
    #[error("No active session")]
    NoActiveSession,

    /// Session writer has stopped.
    ///
    /// Returned when writing to a session whose channel is already closed.
    #[error("Session {session_id} closed")]
    SessionClosed {
        /// The closed session.
        session_id: SessionId,
    },

    /// Session write queue has no free slot.
    ///
    /// The guest is not reading fast enough; the frame was not queued.
    #[error("Session {session_id} write queue full")]
    QueueFull {
        /// The congested session.
        session_id: SessionId,
    },

    /// Channel-level failure.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Read or write deadline exceeded.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Command identifier is not a positive integer.
    #[error("Invalid command: {value}")]
    InvalidCommand {
        /// The rejected input, as received.
        value: String,
    },

    /// Control request carried no command identifier.
    #[error("No command specified")]
    NoCommandSpecified,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a framing error.
    #[inline]
    pub fn framing(message: impl Into<String>) -> Self {
        Self::Framing {
            message: message.into(),
        }
    }

    /// Creates a payload too large error.
    #[inline]
    pub fn payload_too_large(len: usize, capacity: usize) -> Self {
        Self::PayloadTooLarge { len, capacity }
    }

    /// Creates a short read error.
    #[inline]
    pub fn short_read(received: usize, expected: usize) -> Self {
        Self::ShortRead { received, expected }
    }

    /// Creates a session closed error.
    #[inline]
    pub fn session_closed(session_id: SessionId) -> Self {
        Self::SessionClosed { session_id }
    }

    /// Creates a queue full error.
    #[inline]
    pub fn queue_full(session_id: SessionId) -> Self {
        Self::QueueFull { session_id }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates an invalid command error.
    #[inline]
    pub fn invalid_command(value: impl Into<String>) -> Self {
        Self::InvalidCommand {
            value: value.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error ends the session that produced it.
    ///
    /// Framing errors only drop the offending frame.
    #[inline]
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::ShortRead { .. }
                | Self::SessionClosed { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::Io(_)
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::SessionClosed { .. }
                | Self::NoActiveSession
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a framing error.
    #[inline]
    #[must_use]
    pub fn is_framing_error(&self) -> bool {
        matches!(self, Self::Framing { .. } | Self::PayloadTooLarge { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
