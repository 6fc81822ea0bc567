//! Satellite swath downloader service.
//!
//! Polls near-real-time archives for MODIS and SEVIRI swaths with:
//! - Most-recent-first listing per stream and acquisition-hour window
//! - Study-region filtering from MODIS metadata sidecars
//! - Structural validation, with corrupted downloads removed for retry
//! - Backlog reconciliation against the produced image artifacts
//! - Daily partition reset and composite-map requests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use swath_downloader::archive::{HttpArchive, RemoteArchive};
use swath_downloader::config::PipelineConfig;
use swath_downloader::cycle::Stream;
use swath_downloader::handoff;
use swath_downloader::scheduler::Scheduler;
use swath_ingest::{SignatureValidator, SwathValidator};

#[derive(Parser, Debug)]
#[command(name = "swath-downloader")]
#[command(about = "Near-real-time satellite swath downloader")]
struct Args {
    /// Pipeline configuration file
    #[arg(short, long, env = "SWATH_CONFIG", default_value = "config/pipeline.yaml")]
    config: PathBuf,

    /// Run one cycle and exit (vs continuous polling)
    #[arg(long)]
    once: bool,

    /// Specific stream to poll with --once (default: all enabled)
    #[arg(short, long, requires = "once")]
    stream: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!(config = %args.config.display(), "Starting swath downloader");

    let config = PipelineConfig::load(&args.config)?;

    // One client per archive, shared by its streams
    let mut archives: HashMap<String, Arc<dyn RemoteArchive>> = HashMap::new();
    for (name, archive) in &config.archives {
        let client = HttpArchive::from_config(archive)
            .with_context(|| format!("Failed to set up archive {}", name))?;
        archives.insert(name.clone(), Arc::new(client));
    }

    let validator: Arc<dyn SwathValidator> = Arc::new(SignatureValidator);
    let streams: Vec<Stream> = config
        .enabled_streams()
        .filter_map(|stream| {
            archives.get(&stream.archive).map(|archive| {
                Stream::new(stream.clone(), archive.clone(), validator.clone(), config.region)
            })
        })
        .collect();

    info!(
        streams = streams.len(),
        file_root = %config.paths.file_root.display(),
        image_root = %config.paths.image_root.display(),
        "Configured streams"
    );

    let sink = handoff::from_config(&config.handoff).context("Invalid hand-off config")?;
    let mut scheduler = Scheduler::new(
        streams,
        config.paths.layout(),
        sink,
        &config.schedule,
        Utc::now(),
    );

    if args.once {
        // Single run mode
        info!("Running single download cycle");

        let reports = scheduler
            .run_once(args.stream.as_deref(), Utc::now())
            .await?;
        let downloaded: usize = reports.iter().map(|r| r.downloaded).sum();
        let handed_off: usize = reports.iter().map(|r| r.handed_off).sum();
        info!(cycles = reports.len(), downloaded, handed_off, "Single run complete");
    } else {
        // Continuous polling mode
        info!("Starting continuous polling");

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // Handle Ctrl+C
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        scheduler.run_forever(shutdown_tx.subscribe()).await?;
    }

    Ok(())
}
