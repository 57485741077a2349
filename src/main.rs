use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsfan::config::{Config, LoggingConfig};

mod commands;

use commands::{serve, sync, ServeParams, SyncParams};

#[derive(Parser)]
#[command(
    name = "newsfan",
    version,
    about = "Concurrent RSS/Atom aggregator with a deduplicating, time-ordered store",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the configured feeds in the background and serve the HTTP API
    Serve {
        /// Address to bind, e.g. 127.0.0.1:8080
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fetch feeds once and print the most recent items as JSON
    Sync {
        /// Feed URLs (defaults to the configured feeds)
        feeds: Vec<String>,

        /// Number of items to print
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    setup_tracing(&config.logging, cli.verbose)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "newsfan starting");

    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!(bind = ?bind, feeds = config.feeds.urls.len(), "Starting serve command");
            serve(ServeParams { config, bind }).await?;
        }

        Commands::Sync { feeds, count } => {
            tracing::info!(feeds = feeds.len(), count, "Starting sync command");
            sync(SyncParams {
                config,
                feeds,
                count,
            })
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("newsfan=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!("newsfan={},warn", logging.level))
        })
    };

    match logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
