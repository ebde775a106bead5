//! `vmm-serial` - answers guest agent queries and accepts control triggers.
//!
//! Run with defaults:
//!
//! ```text
//! vmm-serial --addr 0.0.0.0:12345 --control-addr 127.0.0.1:12346
//! ```
//!
//! Values from `--config` are applied first; any flag given on the command
//! line overrides them.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vmm_serial::{
    ControlServer, ControlSurface, Dispatcher, GuestListener, HostConfig, HostConfigBuilder,
    Injector, ServerOptions, SessionRegistry,
};

// ============================================================================
// Cli
// ============================================================================

/// Host-side responder for the guest agent serial channel.
#[derive(Debug, Parser)]
#[command(name = "vmm-serial")]
#[command(version)]
#[command(about = "Host-side responder for the guest agent serial channel")]
struct Cli {
    /// JSON file with reported values.
    #[arg(long, env = "VMM_SERIAL_CONFIG")]
    config: Option<PathBuf>,

    /// Host serial number.
    #[arg(long)]
    hostsn: Option<String>,

    /// Guest serial number.
    #[arg(long)]
    guestsn: Option<String>,

    /// Guest UUID.
    #[arg(long)]
    guestuuid: Option<Uuid>,

    /// Cluster UUID.
    #[arg(long)]
    cluster_uuid: Option<Uuid>,

    /// Number of CPUs reported.
    #[arg(long)]
    cpu: Option<u32>,

    /// CPU architecture string.
    #[arg(long)]
    cpu_arch: Option<String>,

    /// Host platform build number.
    #[arg(long)]
    buildnumber: Option<i64>,

    /// Host platform fix number.
    #[arg(long)]
    fixnumber: Option<i64>,

    /// VMM version string.
    #[arg(long)]
    vmmversion: Option<String>,

    /// VMM timestamp (seconds since epoch).
    #[arg(long)]
    vmmts: Option<i64>,

    /// Guest channel listen address.
    #[arg(long, default_value_t = ServerOptions::default().listen_addr)]
    addr: SocketAddr,

    /// Control surface listen address.
    #[arg(long, default_value_t = ServerOptions::default().control_addr)]
    control_addr: SocketAddr,

    /// Per-frame read deadline in milliseconds.
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Per-frame write deadline in milliseconds.
    #[arg(long)]
    write_timeout_ms: Option<u64>,

    /// Log level for this crate; `RUST_LOG` is used when absent.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file (if any) and applies flag overrides.
    fn host_config(&self) -> anyhow::Result<HostConfig> {
        let base = match &self.config {
            Some(path) => HostConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HostConfig::default(),
        };

        let mut builder = HostConfigBuilder::from_config(base);

        if let Some(serial) = &self.hostsn {
            builder = builder.host_serial(serial.as_str());
        }
        if let Some(serial) = &self.guestsn {
            builder = builder.guest_serial(serial.as_str());
        }
        if let Some(uuid) = self.guestuuid {
            builder = builder.guest_uuid(uuid);
        }
        if let Some(uuid) = self.cluster_uuid {
            builder = builder.cluster_uuid(uuid);
        }
        if let Some(count) = self.cpu {
            builder = builder.cpu_count(count);
        }
        if let Some(arch) = &self.cpu_arch {
            builder = builder.cpu_arch(arch.as_str());
        }
        if let Some(build) = self.buildnumber {
            builder = builder.build_number(build);
        }
        if let Some(fix) = self.fixnumber {
            builder = builder.fix_number(fix);
        }
        if let Some(version) = &self.vmmversion {
            builder = builder.vmm_version(version.as_str());
        }
        if let Some(timestamp) = self.vmmts {
            builder = builder.vmm_timestamp(timestamp);
        }

        Ok(builder.build()?)
    }

    /// Listen addresses and deadlines.
    fn server_options(&self) -> ServerOptions {
        let mut options = ServerOptions {
            listen_addr: self.addr,
            control_addr: self.control_addr,
            ..ServerOptions::default()
        };

        if let Some(ms) = self.read_timeout_ms {
            options.session = options.session.with_read_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.write_timeout_ms {
            options.session = options
                .session
                .with_write_timeout(Duration::from_millis(ms));
        }

        options
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(format!("vmm_serial={level}")),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vmm_serial=info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = Arc::new(cli.host_config()?);
    let options = cli.server_options();

    info!(
        host_serial = %config.host_serial,
        guest_uuid = %config.guest_uuid,
        cpu_count = config.cpu_count,
        "Configuration loaded"
    );

    let dispatcher = Arc::new(Dispatcher::standard(Arc::clone(&config)));
    let registry = Arc::new(SessionRegistry::new());
    let injector = Arc::new(Injector::new(Arc::clone(&registry), &config));
    let surface = Arc::new(ControlSurface::new(injector));

    let listener = GuestListener::bind(options.listen_addr)
        .await
        .with_context(|| format!("binding guest listener on {}", options.listen_addr))?;
    let control = ControlServer::bind(options.control_addr)
        .await
        .with_context(|| format!("binding control server on {}", options.control_addr))?;

    tokio::spawn(listener.serve(dispatcher, Arc::clone(&registry), options.session));
    tokio::spawn(control.serve(surface));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl+C")?;

    info!(sessions = registry.len(), "Shutting down");
    registry.shutdown_all();

    Ok(())
}
