//! Wire protocol types.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Channel |
//! |---------|-----------|---------|
//! | Request [`Frame`] | Guest → Host, Host → Guest (injection) | Guest channel |
//! | Response [`Frame`] | Host → Guest | Guest channel |
//! | [`ControlRequest`] | Controller → Host | Control WebSocket |
//! | [`ControlReply`] | Host → Controller | Control WebSocket |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Known command identifiers |
//! | `control` | Control surface JSON messages |
//! | `frame` | Fixed-size frame codec |

// ============================================================================
// Submodules
// ============================================================================

/// Known command identifiers.
pub mod command;

/// Control surface JSON messages.
pub mod control;

/// Fixed-size frame codec.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use control::{ControlReply, ControlRequest, ReplyType};
pub use frame::{FRAME_SIZE, Frame, FrameHeader, HEADER_SIZE, PAYLOAD_CAPACITY, decode, encode};
