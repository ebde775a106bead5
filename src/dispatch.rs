//! Command dispatch.
//!
//! Maps a frame's `command_id` to a reply built from [`HostConfig`]. The
//! mapping is a [`CommandTable`] of handler closures, fixed once the
//! [`Dispatcher`] is constructed.
//!
//! # Standard Table
//!
//! | Command | Reply |
//! |---------|-------|
//! | Host version | `{"buildnumber":<n>,"smallfixnumber":<n>}` |
//! | Guest/host serial, UUIDs | configured value |
//! | Guest CPU info | `{"cpuinfo":"<arch>, <n>","vcpu_num":<n>}` |
//! | VMM version | `{"id":"Virtualization",...}` |
//! | Update deadline | `9223372036854775807` |
//! | Power, version info, guest info, timestamp | acknowledge |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::HostConfig;
use crate::error::Result;
use crate::protocol::Command;

// ============================================================================
// Types
// ============================================================================

/// Handler callback type.
///
/// Pure function of the configuration; must not block.
pub type Handler = Box<dyn Fn(&HostConfig) -> Result<Reply> + Send + Sync>;

// ============================================================================
// Reply
// ============================================================================

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to send as the response payload.
    Payload(String),
    /// Command accepted with nothing of its own to report.
    ///
    /// A response, if requested, echoes the inbound payload.
    Acknowledge,
}

impl Reply {
    /// Serializes `value` as compact JSON.
    fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Payload(serde_json::to_string(value)?))
    }

    /// Returns the payload text, if any.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Payload(text) => Some(text),
            Self::Acknowledge => None,
        }
    }
}

// ============================================================================
// Payload Shapes
// ============================================================================

#[derive(Serialize)]
struct HostVersion {
    buildnumber: i64,
    smallfixnumber: i64,
}

#[derive(Serialize)]
struct CpuInfo {
    cpuinfo: String,
    vcpu_num: u32,
}

#[derive(Serialize)]
struct VmmVersion<'a> {
    id: &'static str,
    name: &'static str,
    timestamp: i64,
    version: &'a str,
}

// ============================================================================
// Standard Handlers
// ============================================================================

fn acknowledge(_: &HostConfig) -> Result<Reply> {
    Ok(Reply::Acknowledge)
}

fn host_version(config: &HostConfig) -> Result<Reply> {
    Reply::json(&HostVersion {
        buildnumber: config.build_number,
        smallfixnumber: config.fix_number,
    })
}

fn guest_serial(config: &HostConfig) -> Result<Reply> {
    Ok(Reply::Payload(config.guest_serial.clone()))
}

fn guest_cpu_info(config: &HostConfig) -> Result<Reply> {
    Reply::json(&CpuInfo {
        cpuinfo: format!("{}, {}", config.cpu_arch, config.cpu_count),
        vcpu_num: config.cpu_count,
    })
}

fn vmm_version(config: &HostConfig) -> Result<Reply> {
    Reply::json(&VmmVersion {
        id: "Virtualization",
        name: "Virtual Machine Manager",
        timestamp: config.vmm_timestamp,
        version: &config.vmm_version,
    })
}

fn guest_uuid(config: &HostConfig) -> Result<Reply> {
    Ok(Reply::Payload(config.guest_uuid.hyphenated().to_string()))
}

fn cluster_uuid(config: &HostConfig) -> Result<Reply> {
    Ok(Reply::Payload(config.cluster_uuid.hyphenated().to_string()))
}

fn host_serial(config: &HostConfig) -> Result<Reply> {
    Ok(Reply::Payload(config.host_serial.clone()))
}

fn update_deadline(_: &HostConfig) -> Result<Reply> {
    Ok(Reply::Payload(i64::MAX.to_string()))
}

/// Handler used for `command` in [`CommandTable::standard`].
pub(crate) fn standard_handler(command: Command) -> fn(&HostConfig) -> Result<Reply> {
    match command {
        Command::HostVersion => host_version,
        Command::GuestSerial => guest_serial,
        Command::GuestCpuInfo => guest_cpu_info,
        Command::VmmVersion => vmm_version,
        Command::GuestUuid => guest_uuid,
        Command::ClusterUuid => cluster_uuid,
        Command::HostSerial => host_serial,
        Command::UpdateDeadline => update_deadline,
        Command::GuestPowerInfo
        | Command::HostVersionInfo
        | Command::GuestInfo
        | Command::GuestTimestamp => acknowledge,
    }
}

// ============================================================================
// CommandTable
// ============================================================================

/// One table row.
struct CommandEntry {
    label: &'static str,
    handler: Handler,
}

/// Mapping from command id to label and handler.
#[derive(Default)]
pub struct CommandTable {
    entries: FxHashMap<i32, CommandEntry>,
}

impl CommandTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table covering every [`Command`].
    #[must_use]
    pub fn standard() -> Self {
        let mut table = Self::new();
        for &command in Command::ALL {
            table.insert(command.id(), command.label(), standard_handler(command));
        }
        table
    }

    /// Adds or replaces the entry for `command_id`.
    pub fn insert<F>(&mut self, command_id: i32, label: &'static str, handler: F)
    where
        F: Fn(&HostConfig) -> Result<Reply> + Send + Sync + 'static,
    {
        self.entries.insert(
            command_id,
            CommandEntry {
                label,
                handler: Box::new(handler),
            },
        );
    }

    /// Returns the label for `command_id`, if it has an entry.
    #[inline]
    #[must_use]
    pub fn label(&self, command_id: i32) -> Option<&'static str> {
        self.entries.get(&command_id).map(|entry| entry.label)
    }

    /// Returns `true` if `command_id` has an entry.
    #[inline]
    #[must_use]
    pub fn contains(&self, command_id: i32) -> bool {
        self.entries.contains_key(&command_id)
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("CommandTable").field("ids", &ids).finish()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Resolves command ids against a table and the shared configuration.
///
/// Immutable after construction; share it as `Arc<Dispatcher>`.
#[derive(Debug)]
pub struct Dispatcher {
    config: Arc<HostConfig>,
    table: CommandTable,
}

impl Dispatcher {
    /// Creates a dispatcher over a custom table.
    #[inline]
    #[must_use]
    pub fn new(config: Arc<HostConfig>, table: CommandTable) -> Self {
        Self { config, table }
    }

    /// Creates a dispatcher over [`CommandTable::standard`].
    #[inline]
    #[must_use]
    pub fn standard(config: Arc<HostConfig>) -> Self {
        Self::new(config, CommandTable::standard())
    }

    /// Runs the handler for `command_id`.
    ///
    /// Returns `Ok(None)` when the table has no entry: the caller sends
    /// nothing, whether or not a response was requested.
    ///
    /// # Errors
    ///
    /// Propagates a handler failure.
    pub fn dispatch(&self, command_id: i32) -> Result<Option<Reply>> {
        match self.table.entries.get(&command_id) {
            Some(entry) => (entry.handler)(&self.config).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the label for `command_id`, if known.
    #[inline]
    #[must_use]
    pub fn label(&self, command_id: i32) -> Option<&'static str> {
        self.table.label(command_id)
    }

    /// Returns the shared configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Arc<HostConfig> {
        &self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
