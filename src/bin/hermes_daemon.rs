use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use hermes::config::{Config, CONFIG_ENV};
use hermes::detection::DetectionEngine;
use hermes::geolocation::MaxMindGeoResolver;
use hermes::input::{AsyncFileTailer, StartPosition};
use hermes::models::Event;
use hermes::output::{DetectionRecord, OutputFormat, OutputHandler};
use hermes::persistence::SqliteEventStore;

const CHANNEL_CAPACITY: usize = 1024;

/// Main daemon entry point for impossible travel detection
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Hermes daemon...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let config = Config::load(&config_path)?;

    let input_path = config
        .input
        .file_path
        .clone()
        .ok_or("input.file_path must be set for the daemon")?;

    // Setup graceful shutdown signal handling
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, gracefully stopping...");
        let _ = shutdown_tx.send(true);
    })?;

    // Initialize output handler
    let mut output_handler = OutputHandler::new(
        OutputFormat::parse(&config.output.format),
        config.output.file_path.clone(),
    )?;

    // Initialize detection components
    let store = SqliteEventStore::new(&config.event_db.path)?;
    let resolver = MaxMindGeoResolver::new(&config.geo_db.path)?;
    let engine = DetectionEngine::from_config(&config, Arc::new(store), Arc::new(resolver));
    log::info!(
        "Detection engine initialized (threshold {} mph)",
        engine.suspicious_speed_mph()
    );

    // Initialize input source
    let (event_tx, mut event_rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
    let mut tailer = AsyncFileTailer::new(input_path.clone(), StartPosition::End);
    tokio::spawn(async move {
        if let Err(e) = tailer.run(event_tx).await {
            log::error!("File tailer stopped: {}", e);
        }
    });
    log::info!("Monitoring event file: {:?}", input_path);
    log::info!("Daemon running. Press Ctrl+C to stop.");

    let (record_tx, mut record_rx) = mpsc::channel::<DetectionRecord>(CHANNEL_CAPACITY);

    // Main event processing loop
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    log::warn!("Input closed");
                    break;
                };
                spawn_detection(engine.clone(), event, record_tx.clone());
            }
            Some(record) = record_rx.recv() => write_record(&mut output_handler, &record),
        }
    }

    // Let in-flight detections finish before exiting
    drop(event_rx);
    drop(record_tx);
    while let Some(record) = record_rx.recv().await {
        write_record(&mut output_handler, &record);
    }

    output_handler.flush()?;
    log::info!("Hermes daemon stopped");
    Ok(())
}

/// Process a single event on its own task
fn spawn_detection(engine: DetectionEngine, event: Event, records: mpsc::Sender<DetectionRecord>) {
    tokio::spawn(async move {
        let event_id = event.id();
        match engine.process_event(event.clone()).await {
            Ok(result) => {
                if records.send(DetectionRecord::new(event, result)).await.is_err() {
                    log::error!("Output closed, dropping verdict for event {}", event_id);
                }
            }
            Err(e) => log::error!("Rejected event {}: {}", event_id, e),
        }
    });
}

fn write_record(output_handler: &mut OutputHandler, record: &DetectionRecord) {
    if record.result.is_suspicious() {
        log::warn!(
            "SUSPICIOUS TRAVEL: User: {}, IP: {}, Event: {}",
            record.event.username(),
            record.event.source_ip(),
            record.event.id()
        );
    }
    if let Err(e) = output_handler.write_record(record) {
        log::error!("Failed to write verdict for event {}: {}", record.event.id(), e);
    }
}
