// CLI entry point for the keeper server.
//
// Loads a `ServerConfig` (JSON file or defaults), applies command-line
// overrides, and serves until the process is killed. See `server.rs` for
// the threading architecture.
//
// Logging goes through `tracing`; set `RUST_LOG` to change the filter
// (default `info`).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use keeper_server::{ServerConfig, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keeper-server", about = "Authoritative keeper trap server")]
struct Args {
    /// Listen port; overrides the config file
    #[arg(long)]
    port: Option<u16>,

    /// JSON server config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Map width in tiles
    #[arg(long)]
    width: Option<u32>,

    /// Map height in tiles
    #[arg(long)]
    height: Option<u32>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(width) = self.width {
            config.map_width = width;
        }
        if let Some(height) = self.height {
            config.map_height = height;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let (handle, addr) = start_server(config).context("failed to start server")?;
    info!(%addr, "serving; stop with Ctrl+C");
    handle.join();
    Ok(())
}
