//! ESPIR firmware host runtime: entry point.
//!
//! Runs the IR blaster's control loop on a desktop or server machine.  The
//! EEPROM region is a file, the IR front end is simulated, and the companion
//! app link is the terminal: one JSON request per stdin line, one JSON
//! response per stdout line.  Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! espir-fw [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   TOML config file [default: espir.toml]
//!   --store     <PATH>   Catalog region file (overrides [storage] path)
//!   --log-level <LEVEL>  Log level when RUST_LOG is unset (overrides [firmware] log_level)
//!   --write-config       Write the effective config to --config and exit
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable       | Flag          |
//! |----------------|---------------|
//! | `ESPIR_CONFIG` | `--config`    |
//! | `ESPIR_STORE`  | `--store`     |
//! | `ESPIR_LOG`    | `--log-level` |
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::into_firmware_config()   -- TOML file + flag overrides
//!  └─ FileStore → Catalog::load()   -- restore or start empty
//!  └─ CommandDispatcher             -- catalog + hardware + clock + platform
//!  └─ ControlLoop                   -- dispatcher + stdio transport
//!       ticked every poll_interval_ms until Ctrl-C, a restart request,
//!       or stdin closing with nothing left in flight
//! ```
//!
//! A restart request ends the process; a supervisor (systemd, a shell loop)
//! is expected to start it again.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use espir_core::{Catalog, LoadOutcome};
use espir_firmware::application::control_loop::ControlLoop;
use espir_firmware::application::dispatcher::{CommandDispatcher, DispatcherSettings};
use espir_firmware::infrastructure::hardware::simulated::SimulatedHardware;
use espir_firmware::infrastructure::platform::{HostPlatform, SystemClock};
use espir_firmware::infrastructure::storage::config::{load_config, save_config, FirmwareConfig};
use espir_firmware::infrastructure::storage::file_store::FileStore;
use espir_firmware::infrastructure::transport::stdio::StdioTransport;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// ESPIR IR blaster firmware, host build.
#[derive(Debug, Parser)]
#[command(
    name = "espir-fw",
    about = "ESPIR IR blaster control firmware (host runtime)",
    version
)]
struct Cli {
    /// Path of the TOML config file.  A missing file means all defaults.
    #[arg(long, default_value = "espir.toml", env = "ESPIR_CONFIG")]
    config: PathBuf,

    /// Catalog region file, overriding `[storage] path`.
    #[arg(long, env = "ESPIR_STORE")]
    store: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is unset, overriding
    /// `[firmware] log_level`.
    #[arg(long, env = "ESPIR_LOG")]
    log_level: Option<String>,

    /// Write the effective config (file plus overrides) back to `--config`
    /// and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies the flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the merged config fails validation.
    fn into_firmware_config(self) -> anyhow::Result<FirmwareConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;
        if let Some(store) = self.store {
            config.storage.path = store;
        }
        if let Some(level) = self.log_level {
            config.firmware.log_level = level;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let write_config = cli.write_config;
    let config = cli.into_firmware_config()?;

    // Responses own stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.firmware.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if write_config {
        save_config(&config_path, &config)
            .with_context(|| format!("failed to write config to {}", config_path.display()))?;
        info!("wrote effective config to {}", config_path.display());
        return Ok(());
    }

    info!("ESPIR firmware {} starting", env!("CARGO_PKG_VERSION"));

    // ── Composition root ──────────────────────────────────────────────────────
    let store = FileStore::open(&config.storage.path, config.storage.size).with_context(|| {
        format!(
            "failed to open catalog region {}",
            config.storage.path.display()
        )
    })?;
    let mut catalog = Catalog::new(Box::new(store));
    match catalog.load() {
        LoadOutcome::Restored { devices } => info!("catalog loaded with {devices} devices"),
        LoadOutcome::Empty { reason } => info!("catalog starts empty ({reason})"),
    }

    let hardware =
        SimulatedHardware::from_config(&config.hardware).context("invalid [hardware] section")?;
    let platform = HostPlatform::new();
    let dispatcher = CommandDispatcher::new(
        catalog,
        Box::new(hardware),
        Box::new(SystemClock::new()),
        Box::new(platform.clone()),
        DispatcherSettings::from(&config),
    );
    let mut control_loop = ControlLoop::new(dispatcher, Box::new(StdioTransport::spawn()));

    // ── Run loop ──────────────────────────────────────────────────────────────
    let mut ticker = tokio::time::interval(Duration::from_millis(config.firmware.poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("ESPIR firmware ready, reading requests from stdin");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Sampled before the tick: the link only reads detached once
                // every line stdin delivered has been handled.
                let attached = control_loop.transport_status().connected;
                control_loop.tick();

                if let Some(kind) = platform.restart_requested() {
                    info!("{} requested, exiting for the supervisor", kind.as_str());
                    break;
                }
                if !attached && control_loop.is_idle() {
                    info!("peer detached with nothing in flight");
                    break;
                }
            }
            result = &mut shutdown => {
                match result {
                    Ok(()) => info!("received Ctrl+C, shutting down"),
                    Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
                }
                break;
            }
        }
    }

    info!("ESPIR firmware stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
