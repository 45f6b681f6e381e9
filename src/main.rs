use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use segmented_recorder::{
    CaptureConfig, Config, LogNotifier, RecorderConfig, RecorderSession, SegmentExporter,
    SyntheticBackend,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "segmented-recorder",
    about = "Record audio into byte-bounded segments"
)]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/segmented-recorder")]
    config: String,

    /// How long to capture before stopping, in seconds
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// Session identifier (defaults to a generated one)
    #[arg(long)]
    session_id: Option<String>,

    /// Directory for exported segment WAV files (overrides config)
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    let capture_config = CaptureConfig {
        sample_rate: cfg.capture.sample_rate,
        channels: cfg.capture.channels,
        chunk_interval_ms: cfg.capture.chunk_interval_ms,
    };

    let mut recorder_config = RecorderConfig {
        segment_threshold_bytes: cfg.segments.threshold_bytes,
        ..RecorderConfig::default()
    };
    if let Some(session_id) = args.session_id {
        recorder_config.session_id = session_id;
    }

    let backend = Box::new(SyntheticBackend::new(capture_config));
    let session = RecorderSession::new(recorder_config, backend, Arc::new(LogNotifier));

    session.start().await?;
    info!("Recording for {} seconds", args.duration_secs);
    tokio::time::sleep(Duration::from_secs(args.duration_secs)).await;

    let stats = session.stop().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let export_dir = args
        .export_dir
        .unwrap_or_else(|| PathBuf::from(&cfg.segments.export_path));
    let exporter = SegmentExporter::new(session.session_id().to_string(), export_dir)?;

    for file in exporter.export(&session.segments().await)? {
        info!("Wrote {:?} ({} bytes)", file.path, file.bytes);
    }

    Ok(())
}
