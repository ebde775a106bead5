//! Host-originated command injection.
//!
//! Builds a request frame for a command id and queues it on a session.
//! Injection is fire-and-forget: any answer from the guest arrives through
//! that session's read loop like every other inbound frame.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::error::{Error, Result};
use crate::identifiers::{CorrelationId, SessionId};
use crate::protocol::Frame;
use crate::transport::SessionRegistry;

// ============================================================================
// InjectTarget
// ============================================================================

/// Which session receives an injected frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InjectTarget {
    /// The registry's current session.
    #[default]
    Current,
    /// A specific session.
    Session(SessionId),
}

// ============================================================================
// Injected
// ============================================================================

/// Where an injected frame went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Injected {
    /// Session the frame was queued on.
    pub session_id: SessionId,
    /// Correlation id of the queued frame.
    pub correlation_id: CorrelationId,
}

// ============================================================================
// Injector
// ============================================================================

/// Sends host-originated requests to guest sessions.
#[derive(Debug, Clone)]
pub struct Injector {
    registry: Arc<SessionRegistry>,
    guest_uuid: Uuid,
}

impl Injector {
    /// Creates an injector stamping frames with the configured guest UUID.
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, config: &HostConfig) -> Self {
        Self {
            registry,
            guest_uuid: config.guest_uuid,
        }
    }

    /// Queues a request for `command_id` on the current session.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveSession`] if no session is registered
    /// - [`Error::SessionClosed`] if the session's writer has stopped
    pub fn inject(&self, command_id: i32, sub_command: i32) -> Result<Injected> {
        self.inject_to(InjectTarget::Current, command_id, sub_command)
    }

    /// Queues a request for `command_id` on the chosen session.
    ///
    /// The frame has a fresh random correlation id, the synthetic guest id,
    /// `is_req = 1`, `need_response = 0` and zero lengths.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveSession`] if the target session does not exist
    /// - [`Error::QueueFull`] if the session's write queue is full
    /// - [`Error::SessionClosed`] if the session's writer has stopped
    pub fn inject_to(
        &self,
        target: InjectTarget,
        command_id: i32,
        sub_command: i32,
    ) -> Result<Injected> {
        let session = match target {
            InjectTarget::Current => self.registry.current(),
            InjectTarget::Session(id) => self.registry.get(id),
        }
        .ok_or(Error::NoActiveSession)?;

        let frame = Frame::request(self.guest_uuid, command_id, sub_command);
        session.send_frame(&frame)?;

        let injected = Injected {
            session_id: session.id(),
            correlation_id: frame.header.correlation_id,
        };

        info!(
            session_id = %injected.session_id,
            command_id,
            sub_command,
            correlation_id = %injected.correlation_id,
            "Command injected"
        );
        debug!(?target, "Injection target resolved");

        Ok(injected)
    }
}

// ============================================================================
// Tests
// ============================================================================
