//! TourBox server entry point.
//!
//! Runs one listener for the TourBox Console and prints every host event to
//! stdout as a JSON line.  Logs go to stderr, so stdout can be piped straight
//! into another program.
//!
//! # Usage
//!
//! ```text
//! tourbox-server [OPTIONS]
//!
//! Options:
//!   --port   <PORT>  TCP port the Console connects to [default: 50500]
//!   --bind   <IP>    IP address to bind [default: 127.0.0.1]
//!   --raw            Also print every received chunk
//!   --config <PATH>  Config file to read instead of the platform default
//!   --save-config    Write the effective configuration to the config file
//!                    and exit
//! ```
//!
//! # Output
//!
//! ```text
//! {"event":"connect","ip":"127.0.0.1","port":51234}
//! {"event":"control","name":"Knob CW","count":3}
//! {"event":"raw","bytes":[196,196,196]}
//! {"event":"disconnect","ip":"127.0.0.1","port":51234}
//! ```
//!
//! # Precedence
//!
//! CLI flags (or their environment variables) override the config file,
//! which overrides the built-in defaults.  `RUST_LOG` overrides the file's
//! `[logging] level`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tourbox_server::application::{EventSink, HostEvent, RawSink};
use tourbox_server::infrastructure::host_bridge::{channel::ChannelSink, ServerHost};
use tourbox_server::infrastructure::storage::config::{
    config_file_path, load_config, load_config_from, save_config_to, AppConfig, StorageError,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Localhost server for the TourBox Console.
#[derive(Debug, Parser)]
#[command(
    name = "tourbox-server",
    about = "Decodes TourBox Console input into named control events",
    version
)]
struct Cli {
    /// TCP port the Console connects to.
    #[arg(long, env = "TOURBOX_PORT")]
    port: Option<u16>,

    /// IP address to bind.  `127.0.0.1` accepts only local connections.
    #[arg(long, env = "TOURBOX_BIND")]
    bind: Option<String>,

    /// Also print every received chunk as a `raw` event.
    #[arg(long, env = "TOURBOX_RAW")]
    raw: bool,

    /// Config file to read instead of the platform default.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    save_config: bool,
}

impl Cli {
    /// Loads the config file and layers the CLI flags on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed.
    fn into_app_config(self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match load_config() {
                Err(StorageError::NoPlatformConfigDir) => AppConfig::default(),
                other => other.context("failed to load config")?,
            },
        };

        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        config.server.raw_events |= self.raw;
        Ok(config)
    }

    /// The file `--config` names, or the platform default.
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("failed to locate config file"),
        }
    }
}

/// Writes the file config merged with the CLI flags back to the config file.
fn write_config(cli: Cli) -> anyhow::Result<PathBuf> {
    let path = cli.config_path()?;
    let config = cli.into_app_config()?;
    save_config_to(&path, &config)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    Ok(path)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.save_config {
        let path = write_config(cli)?;
        println!("wrote {}", path.display());
        return Ok(());
    }
    let config = cli.into_app_config()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "TourBox server starting on {}:{}",
        config.server.bind_address, config.server.port
    );

    let host = ServerHost::new();

    let (events, mut events_rx) = ChannelSink::<HostEvent>::new();
    let events: Arc<dyn EventSink> = Arc::new(events);
    let (raw, mut raw_rx) = if config.server.raw_events {
        let (sink, rx) = ChannelSink::<Vec<u8>>::new();
        let sink: Arc<dyn RawSink> = Arc::new(sink);
        (Some(sink), Some(rx))
    } else {
        (None, None)
    };

    host.create_server(
        config.server.port,
        events,
        Some(config.server.bind_address.as_str()),
        raw,
    )
    .context("failed to create TourBox server")?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                match result {
                    Ok(()) => info!("received Ctrl+C, shutting down"),
                    Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
                }
                break;
            }
            Some(event) = events_rx.recv() => {
                println!("{}", serde_json::to_string(&event)?);
            }
            Some(chunk) = recv_raw(&mut raw_rx) => {
                println!("{}", serde_json::json!({ "event": "raw", "bytes": chunk }));
            }
            else => break,
        }
    }

    host.shutdown();
    info!("TourBox server stopped");
    Ok(())
}

/// Receives the next raw chunk, or never resolves when raw output is off.
async fn recv_raw(rx: &mut Option<UnboundedReceiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
