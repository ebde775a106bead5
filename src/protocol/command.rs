//! Known command identifiers.
//!
//! The guest agent selects a query by the `command_id` header field. This
//! module names the identifiers the host understands; how each one is
//! answered lives in [`crate::dispatch`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Command
// ============================================================================

macro_rules! define_commands {
    ( $( $(#[$meta:meta])* $variant:ident = $id:literal, $label:literal; )* ) => {
        /// Command identifiers understood by the host.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum Command {
            $( $(#[$meta])* $variant = $id, )*
        }

        impl Command {
            /// Every known command, in identifier order.
            pub const ALL: &'static [Command] = &[ $( Command::$variant, )* ];

            /// Looks up a raw header value. Returns `None` for unknown ids.
            #[must_use]
            pub const fn from_id(id: i32) -> Option<Self> {
                match id {
                    $( $id => Some(Self::$variant), )*
                    _ => None,
                }
            }

            /// Human-readable label for logging.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )*
                }
            }
        }
    };
}

define_commands! {
    /// Guest start or reboot notification.
    GuestPowerInfo = 3, "Guest power info";
    /// Host platform build and fix number.
    HostVersion = 4, "Host version";
    /// Guest serial number.
    GuestSerial = 5, "Guest serial number";
    /// Guest CPU description.
    GuestCpuInfo = 7, "Guest CPU info";
    /// Virtual machine manager version.
    VmmVersion = 8, "VMM version";
    /// Host version info report from the guest.
    HostVersionInfo = 9, "Host version info";
    /// Guest info report.
    GuestInfo = 10, "Guest info";
    /// Guest UUID.
    GuestUuid = 11, "Guest UUID";
    /// Cluster UUID.
    ClusterUuid = 12, "Cluster UUID";
    /// Host serial number.
    HostSerial = 13, "Host serial number";
    /// Deadline refresh, always answered as unbounded.
    UpdateDeadline = 16, "Update deadline";
    /// Guest timestamp report.
    GuestTimestamp = 17, "Guest timestamp";
}

impl Command {
    /// Raw identifier as carried in the frame header.
    #[inline]
    #[must_use]
    pub const fn id(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Tests
// ============================================================================
