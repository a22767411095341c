//! Serves the error demo over HTTP.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package error-demo -- --port 3000
//! curl -i http://127.0.0.1:3000/async-test-1
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use funnel::prelude::*;
use funnel::runtime::ConfigLoader;
use tracing::info;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "error-demo", version, about)]
struct Args {
    /// Configuration file (defaults to searching for funnel.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// How long the simulated call takes before failing, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(port) = args.port {
        loader = loader.set("server.port", port);
    }

    let delay = Duration::from_millis(args.delay_ms);
    let runtime = FunnelRuntime::builder()
        .config_loader(loader)
        .routes(|builder| error_demo::routes(builder, delay))
        .build()
        .context("failed to build runtime")?;

    info!(delay_ms = args.delay_ms, "Error demo ready");
    runtime.serve().await?;

    Ok(())
}
