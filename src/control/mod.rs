//! Control surface.
//!
//! Lets an external controller push a command to the current guest
//! session. [`ControlSurface`] holds the semantics; [`ControlServer`]
//! carries it over WebSocket.
//!
//! | Operation | Input | Result |
//! |-----------|-------|--------|
//! | trigger | positive integer command id | success, or error message |
//! | root | nothing | always "No command specified" |
//!
//! Triggered commands always use sub-command [`TRIGGER_SUB_COMMAND`].

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket control server.
pub mod server;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::injector::{Injected, Injector};
use crate::protocol::{ControlReply, ControlRequest};

pub use server::ControlServer;

// ============================================================================
// Constants
// ============================================================================

/// Sub-command sent with every triggered command.
pub const TRIGGER_SUB_COMMAND: i32 = 1;

// ============================================================================
// ControlSurface
// ============================================================================

/// Validates controller input and forwards it to the [`Injector`].
#[derive(Debug, Clone)]
pub struct ControlSurface {
    injector: Arc<Injector>,
}

impl ControlSurface {
    /// Creates a control surface over `injector`.
    #[inline]
    #[must_use]
    pub fn new(injector: Arc<Injector>) -> Self {
        Self { injector }
    }

    /// Handles one request, echoing its id in the reply.
    #[must_use]
    pub fn handle(&self, request: ControlRequest) -> ControlReply {
        let reply = match &request.command {
            Some(raw) => match self.trigger(raw) {
                Ok(_) => ControlReply::success(),
                Err(e) => {
                    warn!(command = %raw, error = %e, "Trigger rejected");
                    ControlReply::from(&e)
                }
            },
            None => self.root(),
        };

        reply.with_id(request.id)
    }

    /// Injects the command identified by `raw`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCommand`] if `raw` is not a positive integer
    /// - [`Error::NoActiveSession`] if no session can receive it
    /// - [`Error::QueueFull`] if the guest is not draining its channel
    /// - [`Error::SessionClosed`] if the session is closing
    pub fn trigger(&self, raw: &Value) -> Result<Injected> {
        let command_id = parse_command(raw)?;
        self.injector.inject(command_id, TRIGGER_SUB_COMMAND)
    }

    /// Reply for a request that names no command.
    #[inline]
    #[must_use]
    pub fn root(&self) -> ControlReply {
        ControlReply::from(&Error::NoCommandSpecified)
    }
}

/// Accepts a JSON number or numeric string in `1..=i32::MAX`.
fn parse_command(raw: &Value) -> Result<i32> {
    let parsed = match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .filter(|&id| id > 0)
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| Error::invalid_command(raw.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
