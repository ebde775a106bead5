//! Guest channel transport.
//!
//! This module owns the byte-stream channels between host and guest
//! agents.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐                           ┌──────────────────┐
//! │  Host (Rust)        │                           │  Guest VM        │
//! │                     │    4096-byte frames       │                  │
//! │  GuestListener      │◄─────────────────────────►│  Guest agent     │
//! │  → Session          │    virtual serial / TCP   │                  │
//! │  → SessionRegistry  │                           │                  │
//! └─────────────────────┘                           └──────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `GuestListener::bind` - Bind the configured address
//! 2. `GuestListener::serve` - Accept channels
//! 3. `Session::spawn` - Register as current, start read loop and writer
//! 4. Frames are decoded and dispatched concurrently; responses queue to the writer
//! 5. Channel ends or fails - session leaves the registry and closes
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `listener` | Guest channel accept loop |
//! | `registry` | Active-session registry |
//! | `session` | Read loop, dispatch tasks and writer |

// ============================================================================
// Submodules
// ============================================================================

/// Guest channel accept loop.
pub mod listener;

/// Active-session registry.
pub mod registry;

/// Read loop, dispatch tasks and writer.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use listener::GuestListener;
pub use registry::SessionRegistry;
pub use session::Session;
