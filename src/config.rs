//! Static configuration.
//!
//! [`HostConfig`] holds the values the host reports to the guest (serial
//! numbers, UUIDs, version strings). It is built once at startup, shared as
//! `Arc<HostConfig>`, and never mutated afterwards.
//!
//! [`ServerOptions`] and [`SessionOptions`] hold listen addresses and
//! optional channel deadlines.
//!
//! # Example
//!
//! ```ignore
//! use vmm_serial::HostConfig;
//!
//! let config = HostConfig::builder()
//!     .host_serial("1780PDN123456")
//!     .cpu_count(4)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::dispatch::{Reply, standard_handler};
use crate::error::{Error, Result};
use crate::protocol::{Command, PAYLOAD_CAPACITY};

// ============================================================================
// Constants
// ============================================================================

/// Default serial number for host and guest (13 characters).
pub const DEFAULT_SERIAL: &str = "0000000000000";

/// Default guest UUID.
pub const DEFAULT_GUEST_UUID: Uuid = Uuid::from_u128(0xba13a19a_c0c1_4fef_9346_915ed3b98341);

/// Default cluster UUID.
pub const DEFAULT_CLUSTER_UUID: Uuid = Uuid::from_u128(0x3bdea92b_68f4_4fe9_aa4b_d645c3c63864);

/// Default CPU architecture string.
pub const DEFAULT_CPU_ARCH: &str = "QEMU, Virtual CPU, X86_64";

/// Default host platform build number.
pub const DEFAULT_BUILD_NUMBER: i64 = 42962;

/// Default VMM version string.
pub const DEFAULT_VMM_VERSION: &str = "2.6.1-12139";

/// Default VMM timestamp (seconds since epoch).
pub const DEFAULT_VMM_TIMESTAMP: i64 = 1_679_863_686;

/// Default guest channel listen address.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 12345);

/// Default control surface listen address.
pub const DEFAULT_CONTROL_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 12346);

/// Longest string value that still fits a response with its terminator.
const MAX_VALUE_LEN: usize = PAYLOAD_CAPACITY - 1;

// ============================================================================
// HostConfig
// ============================================================================

/// Values reported to the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host serial number.
    pub host_serial: String,

    /// Guest serial number.
    pub guest_serial: String,

    /// Guest UUID.
    pub guest_uuid: Uuid,

    /// Cluster UUID.
    pub cluster_uuid: Uuid,

    /// Guest CPU architecture description.
    pub cpu_arch: String,

    /// Number of guest CPUs.
    pub cpu_count: u32,

    /// Host platform build number.
    pub build_number: i64,

    /// Host platform fix number.
    pub fix_number: i64,

    /// Virtual machine manager version.
    pub vmm_version: String,

    /// Virtual machine manager build timestamp.
    pub vmm_timestamp: i64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host_serial: DEFAULT_SERIAL.to_string(),
            guest_serial: DEFAULT_SERIAL.to_string(),
            guest_uuid: DEFAULT_GUEST_UUID,
            cluster_uuid: DEFAULT_CLUSTER_UUID,
            cpu_arch: DEFAULT_CPU_ARCH.to_string(),
            cpu_count: 1,
            build_number: DEFAULT_BUILD_NUMBER,
            fix_number: 0,
            vmm_version: DEFAULT_VMM_VERSION.to_string(),
            vmm_timestamp: DEFAULT_VMM_TIMESTAMP,
        }
    }
}

impl HostConfig {
    /// Creates a builder starting from the defaults.
    #[inline]
    #[must_use]
    pub fn builder() -> HostConfigBuilder {
        HostConfigBuilder::new()
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Missing keys take their default value.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Json`] if the file is not valid JSON
    /// - [`Error::Config`] if a value fails validation
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;

        debug!(path = %path.display(), "Configuration loaded");

        Ok(config)
    }

    /// Checks every value can be reported to the guest.
    ///
    /// Each standard reply is rendered and must fit one response frame
    /// together with its terminator byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.cpu_count == 0 {
            return Err(Error::config("cpu_count must be at least 1"));
        }

        for (name, value) in [
            ("host_serial", &self.host_serial),
            ("guest_serial", &self.guest_serial),
            ("cpu_arch", &self.cpu_arch),
            ("vmm_version", &self.vmm_version),
        ] {
            if value.len() > MAX_VALUE_LEN {
                return Err(Error::config(format!(
                    "{name} is {} bytes, at most {MAX_VALUE_LEN} fit in a frame",
                    value.len()
                )));
            }
        }

        for &command in Command::ALL {
            if let Reply::Payload(text) = standard_handler(command)(self)? {
                if text.len() > MAX_VALUE_LEN {
                    return Err(Error::config(format!(
                        "{command} reply is {} bytes, at most {MAX_VALUE_LEN} fit in a frame",
                        text.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// HostConfigBuilder
// ============================================================================

/// Builder for [`HostConfig`].
///
/// Unset values keep the defaults.
#[derive(Debug, Clone, Default)]
pub struct HostConfigBuilder {
    config: HostConfig,
}

impl HostConfigBuilder {
    /// Creates a builder starting from the defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from a file.
    #[inline]
    #[must_use]
    pub fn from_config(config: HostConfig) -> Self {
        Self { config }
    }

    /// Sets the host serial number.
    #[inline]
    #[must_use]
    pub fn host_serial(mut self, serial: impl Into<String>) -> Self {
        self.config.host_serial = serial.into();
        self
    }

    /// Sets the guest serial number.
    #[inline]
    #[must_use]
    pub fn guest_serial(mut self, serial: impl Into<String>) -> Self {
        self.config.guest_serial = serial.into();
        self
    }

    /// Sets the guest UUID.
    #[inline]
    #[must_use]
    pub fn guest_uuid(mut self, uuid: Uuid) -> Self {
        self.config.guest_uuid = uuid;
        self
    }

    /// Sets the cluster UUID.
    #[inline]
    #[must_use]
    pub fn cluster_uuid(mut self, uuid: Uuid) -> Self {
        self.config.cluster_uuid = uuid;
        self
    }

    /// Sets the guest CPU architecture description.
    #[inline]
    #[must_use]
    pub fn cpu_arch(mut self, arch: impl Into<String>) -> Self {
        self.config.cpu_arch = arch.into();
        self
    }

    /// Sets the number of guest CPUs.
    #[inline]
    #[must_use]
    pub fn cpu_count(mut self, count: u32) -> Self {
        self.config.cpu_count = count;
        self
    }

    /// Sets the host platform build number.
    #[inline]
    #[must_use]
    pub fn build_number(mut self, build: i64) -> Self {
        self.config.build_number = build;
        self
    }

    /// Sets the host platform fix number.
    #[inline]
    #[must_use]
    pub fn fix_number(mut self, fix: i64) -> Self {
        self.config.fix_number = fix;
        self
    }

    /// Sets the VMM version string.
    #[inline]
    #[must_use]
    pub fn vmm_version(mut self, version: impl Into<String>) -> Self {
        self.config.vmm_version = version.into();
        self
    }

    /// Sets the VMM timestamp.
    #[inline]
    #[must_use]
    pub fn vmm_timestamp(mut self, timestamp: i64) -> Self {
        self.config.vmm_timestamp = timestamp;
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value fails validation.
    pub fn build(self) -> Result<HostConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// SessionOptions
// ============================================================================

/// Per-session channel deadlines.
///
/// Both default to `None`: reads and writes wait indefinitely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Maximum time to wait for one full frame.
    pub read_timeout: Option<Duration>,

    /// Maximum time to write one frame.
    pub write_timeout: Option<Duration>,
}

impl SessionOptions {
    /// Creates options with no deadlines.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Sets the read deadline.
    #[inline]
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the write deadline.
    #[inline]
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// ServerOptions
// ============================================================================

/// Listen addresses and session options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Address the guest channel listener binds.
    pub listen_addr: SocketAddr,

    /// Address the control surface binds.
    pub control_addr: SocketAddr,

    /// Options applied to every accepted session.
    pub session: SessionOptions,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            control_addr: DEFAULT_CONTROL_ADDR,
            session: SessionOptions::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
