//! Binary entrypoint for the photo carousel server.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use photo_carousel::carousel::Carousel;
use photo_carousel::config::Configuration;
use photo_carousel::{persist, scan, watch, web};

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "photo-carousel", about = "Randomized photo carousel server")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the configured listen port
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("photo_carousel={level}").parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        error!(error = ?err, "photo-carousel exited with error");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut config = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    let config = Arc::new(config.validated().context("validating configuration")?);

    let carousel = Carousel::new();

    let records = persist::load_records(&config.records_file).await;
    let excluded = persist::load_names(&config.ignored_file).await;
    let liked = persist::load_names(&config.liked_file).await;
    carousel.restore_sets(excluded, liked).await;

    if records.is_empty() {
        // Scan in the background so the server answers right away, with the
        // no-data status until the catalog fills.
        let scan_carousel = carousel.clone();
        let scan_config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(err) = scan::rebuild_catalog(&scan_carousel, &scan_config).await {
                error!(error = %err, "initial library scan failed");
            }
        });
    } else {
        carousel.rebuild(records).await;
        info!(count = carousel.len().await, "restored persisted catalog");
    }

    let cancel = CancellationToken::new();
    if config.watch_library {
        let watch_carousel = carousel.clone();
        let watch_config = Arc::clone(&config);
        let watch_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = watch::watch_library(watch_carousel, watch_config, watch_cancel).await
            {
                error!(error = %err, "library watcher failed");
            }
        });
    }

    web::serve(carousel, config, cancel).await
}
