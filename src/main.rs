//! liveserve binary: serve one or more directory trees over HTTP, keeping
//! routes synchronized with the filesystem.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liveserve::{load_config, MountConfig, ServerConfig, StaticServer};

#[derive(Parser)]
#[command(name = "liveserve", about = "Watch-synchronized static file server")]
struct Cli {
    /// TOML configuration file; when given, the flags below are ignored
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to serve at /
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port; a free port is chosen when absent
    #[arg(short, long)]
    port: Option<u16>,

    /// Suppress startup/shutdown and access records
    #[arg(short, long)]
    quiet: bool,

    /// Emit per-event route table updates
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig {
            host: cli.host,
            port: cli.port,
            serve: vec![MountConfig::new(cli.dir, "/")],
            verbose: !cli.quiet,
            debug: cli.debug,
            ..Default::default()
        },
    };

    let default_filter = if config.debug {
        "liveserve=debug"
    } else if config.verbose {
        "liveserve=info"
    } else {
        "liveserve=error"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = StaticServer::new(config);
    server.start().await?;
    server.wait_until_stopped().await;

    Ok(())
}
