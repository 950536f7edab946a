//! Camera Streamer CLI
//!
//! Discovers attached cameras and serves them as MJPEG streams over HTTP.

use camera_streamer::{
    capture::{CaptureBackend, MockBackend, MockSettings},
    config::FileConfig,
    discovery::{DeviceEnumerator, StaticEnumerator, V4l2CtlEnumerator},
    metrics::StreamMetrics,
    registry::CameraRegistry,
    server::{AppState, StreamServer},
    streaming::JpegEncoder,
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Rate-limited MJPEG streams for locally attached cameras.
#[derive(Debug, Parser)]
#[command(name = "camera-streamer", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Serve this many synthetic cameras instead of real devices
    #[arg(long, value_name = "COUNT")]
    mock: Option<usize>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Camera Streamer v{}", camera_streamer::VERSION);

    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            FileConfig::from_file(path)?
        }
        None => FileConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }

    let (enumerator, backend) = capture_source(&config, cli.mock)?;
    let metrics = Arc::new(StreamMetrics::new()?);
    let registry = CameraRegistry::discover(enumerator.as_ref(), backend, config.registry_options())
        .with_metrics(Arc::clone(&metrics));
    if registry.is_empty() {
        warn!("No cameras found; the server will report an empty camera list");
    }

    let state = AppState::new(
        Arc::new(registry),
        Arc::new(JpegEncoder::new()),
        metrics,
        &config.stream,
    );
    let server = StreamServer::new(config.server.clone(), state);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel();
        ctrlc::set_handler(move || {
            let _ = shutdown_tx.send(());
        })?;

        server
            .run(async move {
                shutdown_rx.recv().await;
                info!("Received Ctrl-C");
            })
            .await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    info!("Done");
    Ok(())
}

type CaptureSource = (Box<dyn DeviceEnumerator>, Arc<dyn CaptureBackend>);

fn capture_source(config: &FileConfig, mock: Option<usize>) -> Result<CaptureSource, String> {
    if let Some(count) = mock {
        info!(count, "Using mock cameras");
        let settings = MockSettings::realtime_fps(config.capture.device_fps);
        let backend = MockBackend::with_settings(settings);
        return Ok((Box::new(StaticEnumerator::mock(count)), Arc::new(backend)));
    }

    let enumerator: Box<dyn DeviceEnumerator> = if config.discovery.devices.is_empty() {
        Box::new(V4l2CtlEnumerator::new(config.discovery.command.clone()))
    } else {
        Box::new(StaticEnumerator::new(config.discovery.devices.clone()))
    };

    Ok((enumerator, device_backend()?))
}

#[cfg(feature = "camera")]
fn device_backend() -> Result<Arc<dyn CaptureBackend>, String> {
    Ok(Arc::new(camera_streamer::capture::NokhwaBackend::new()))
}

#[cfg(not(feature = "camera"))]
fn device_backend() -> Result<Arc<dyn CaptureBackend>, String> {
    Err(
        "built without camera support; rebuild with `--features camera` or pass `--mock <COUNT>`"
            .to_string(),
    )
}
