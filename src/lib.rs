//! VMM serial responder - host side of the guest agent channel.
//!
//! A guest agent running inside a virtual machine talks to the host over a
//! byte-stream channel using fixed 4096-byte frames. This library answers
//! the agent's queries (serial numbers, UUIDs, version strings, CPU info)
//! from static configuration, and lets an external controller push
//! host-originated commands into the current session.
//!
//! # Architecture
//!
//! - **Guest side**: sends request frames, expects response frames
//! - **Host side (Rust)**: one read loop per channel, dispatch per frame,
//!   serialized writes, one registry of live sessions
//!
//! Key design principles:
//!
//! - Every frame is exactly [`FRAME_SIZE`](protocol::FRAME_SIZE) bytes,
//!   little-endian, 64-byte header
//! - Responses are computed concurrently but written by one writer per session
//! - The most recently connected session receives injected commands
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vmm_serial::config::DEFAULT_LISTEN_ADDR;
//! use vmm_serial::{Dispatcher, GuestListener, HostConfig, Result, SessionOptions, SessionRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Arc::new(HostConfig::builder().cpu_count(4).build()?);
//!     let dispatcher = Arc::new(Dispatcher::standard(Arc::clone(&config)));
//!     let registry = Arc::new(SessionRegistry::new());
//!
//!     let listener = GuestListener::bind(DEFAULT_LISTEN_ADDR).await?;
//!     listener.serve(dispatcher, registry, SessionOptions::new()).await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Reported values, listen addresses, deadlines |
//! | [`control`] | Control surface and its WebSocket server |
//! | [`dispatch`] | Command table and handlers |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`injector`] | Host-originated command injection |
//! | [`protocol`] | Frame codec, command ids, control messages |
//! | [`transport`] | Listener, sessions and registry |

// ============================================================================
// Modules
// ============================================================================

/// Static configuration.
pub mod config;

/// Control surface.
///
/// Use [`ControlServer`] to expose [`ControlSurface`] over WebSocket.
pub mod control;

/// Command table and handlers.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Host-originated command injection.
pub mod injector;

/// Wire format and message types.
pub mod protocol;

/// Guest channel transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{HostConfig, HostConfigBuilder, ServerOptions, SessionOptions};

// Control surface
pub use control::{ControlServer, ControlSurface};

// Dispatch
pub use dispatch::{CommandTable, Dispatcher, Reply};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CorrelationId, GuestId, SessionId};

// Injection
pub use injector::{InjectTarget, Injected, Injector};

// Protocol types
pub use protocol::{Command, ControlReply, ControlRequest, Frame, FrameHeader};

// Transport types
pub use transport::{GuestListener, Session, SessionRegistry};
