//! Control surface message types.
//!
//! JSON messages exchanged with an external controller over the control
//! WebSocket.
//!
//! # Format
//!
//! Request (trigger):
//! ```json
//! { "id": "any string", "command": 11 }
//! ```
//!
//! A request without `command` addresses the root and always fails.
//!
//! Success:
//! ```json
//! { "id": "any string", "type": "success" }
//! ```
//!
//! Error:
//! ```json
//! { "id": "any string", "type": "error", "message": "No active session" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ============================================================================
// ControlRequest
// ============================================================================

/// A request from the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Opaque id echoed in the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Command identifier, as a number or numeric string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Value>,
}

impl ControlRequest {
    /// Creates a trigger request for `command`.
    #[inline]
    #[must_use]
    pub fn trigger(command: impl Into<Value>) -> Self {
        Self {
            id: None,
            command: Some(command.into()),
        }
    }
}

// ============================================================================
// ControlReply
// ============================================================================

/// Reply to a [`ControlRequest`]. Success carries no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    /// Echo of the request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Outcome.
    #[serde(rename = "type")]
    pub reply_type: ReplyType,

    /// Failure description (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ControlReply {
    /// Creates a success reply.
    #[inline]
    #[must_use]
    pub const fn success() -> Self {
        Self {
            id: None,
            reply_type: ReplyType::Success,
            message: None,
        }
    }

    /// Creates an error reply.
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            id: None,
            reply_type: ReplyType::Error,
            message: Some(message.into()),
        }
    }

    /// Sets the echoed request id.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Returns `true` if this is a success reply.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.reply_type == ReplyType::Success
    }
}

impl From<&Error> for ControlReply {
    fn from(err: &Error) -> Self {
        Self::error(err.to_string())
    }
}

// ============================================================================
// ReplyType
// ============================================================================

/// Reply type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyType {
    /// Command was handed to a session.
    Success,
    /// Command was rejected.
    Error,
}

// ============================================================================
// Tests
// ============================================================================
