//! Type-safe identifiers.
//!
//! Newtype wrappers keep the host-side session counter apart from the
//! signed identifiers carried inside frame headers.
//!
//! | Type | Source | Width |
//! |------|--------|-------|
//! | [`SessionId`] | Host counter, one per accepted channel | `u64` |
//! | [`CorrelationId`] | Frame header, echoed in responses | `i64` |
//! | [`GuestId`] | Frame header | `i64` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// SessionId
// ============================================================================

/// Counter backing [`SessionId::next`]. Starts at 1 so 0 is never issued.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one accepted channel.
///
/// Issued in strictly increasing order, so a larger id always belongs to a
/// more recently accepted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next session id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// CorrelationId
// ============================================================================

/// Caller-chosen frame identifier, echoed unchanged in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CorrelationId(i64);

impl CorrelationId {
    /// Wraps a raw header value.
    #[inline]
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Generates a random non-zero id for host-originated frames.
    #[must_use]
    pub fn generate() -> Self {
        loop {
            let value: i64 = rand::random();
            if value != 0 {
                return Self(value);
            }
        }
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// GuestId
// ============================================================================

/// Numeric guest identifier carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GuestId(i64);

impl GuestId {
    /// Guest id stamped on host-originated frames.
    pub const SYNTHETIC: Self = Self(1);

    /// Wraps a raw header value.
    #[inline]
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_increase() {
        let first = SessionId::next();
        let second = SessionId::next();
        assert!(second > first);
        assert_ne!(first.as_u64(), 0);
    }

    #[test]
    fn test_correlation_id_generate_non_zero() {
        for _ in 0..64 {
            assert_ne!(CorrelationId::generate().as_i64(), 0);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(CorrelationId::new(-7).to_string(), "-7");
        assert_eq!(GuestId::new(42).to_string(), "42");
        assert_eq!(GuestId::SYNTHETIC.as_i64(), 1);
    }
}
