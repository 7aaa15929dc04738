use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use structopt::StructOpt;

use hermes::config::Config;
use hermes::detection::{DetectionEngine, GeoCalculator, HaversineCalculator};
use hermes::generator::EventGenerator;
use hermes::geolocation::{GeoResolver, MaxMindGeoResolver};
use hermes::input::{FileTailer, StartPosition};
use hermes::models::GeoPoint;
use hermes::output::{DetectionRecord, OutputFormat, OutputHandler};
use hermes::persistence::{EventStore, SqliteEventStore};

/// Hermes impossible travel detection command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "hermes", about = "Impossible travel detection CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Load a configuration and open both databases
    Check {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Run every event in a JSON-lines file through detection, in file order
    Replay {
        /// Path to the JSON-lines event file
        #[structopt(short, long)]
        file: PathBuf,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Use a throwaway in-memory event store
        #[structopt(long)]
        in_memory: bool,
        /// Output format: json, jsonl, or console
        #[structopt(long, default_value = "console")]
        format: String,
    },
    /// Show the stored events of a user
    History {
        /// Username to look up
        username: String,
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Maximum number of events to show, most recent last
        #[structopt(short, long, default_value = "20")]
        limit: usize,
    },
    /// Great-circle distance between two points given as "lat,lon"
    Distance {
        #[structopt(parse(try_from_str = parse_point), allow_hyphen_values = true)]
        from: GeoPoint,
        #[structopt(parse(try_from_str = parse_point), allow_hyphen_values = true)]
        to: GeoPoint,
    },
    /// Write synthetic ingestion payloads as JSON lines
    Generate {
        /// Events per user
        #[structopt(short, long, default_value = "100")]
        num: usize,
        /// Output file (stdout if omitted)
        #[structopt(short, long)]
        output: Option<PathBuf>,
        /// Seed for a reproducible stream
        #[structopt(long)]
        seed: Option<u64>,
    },
}

fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got '{}'", s))?;
    let latitude: f64 = lat.trim().parse().map_err(|_| format!("bad latitude '{}'", lat))?;
    let longitude: f64 = lon.trim().parse().map_err(|_| format!("bad longitude '{}'", lon))?;
    Ok(GeoPoint::new(latitude, longitude, 0))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Check { config } => {
            if !config.exists() {
                eprintln!("Configuration file not found: {:?}", config);
                eprintln!("Run 'hermes_cli config' to generate a default configuration");
                std::process::exit(1);
            }

            let config = Config::load(&config)?;
            println!("Configuration loaded successfully");
            println!("  Suspicious speed: {} mph", config.detection.suspicious_speed_mph);

            SqliteEventStore::new(&config.event_db.path)?;
            println!(
                "  Event database: {:?} (max {} connections)",
                config.event_db.path, config.event_db.max_connections
            );

            MaxMindGeoResolver::new(&config.geo_db.path)?;
            println!(
                "  GeoIP database: {:?} (max {} connections)",
                config.geo_db.path, config.geo_db.max_connections
            );
        }
        Cli::Replay {
            file,
            config,
            in_memory,
            format,
        } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }

            let config = Config::load(&config)?;
            let store: Arc<dyn EventStore> = if in_memory {
                Arc::new(SqliteEventStore::in_memory()?)
            } else {
                Arc::new(SqliteEventStore::new(&config.event_db.path)?)
            };
            let resolver: Arc<dyn GeoResolver> = Arc::new(MaxMindGeoResolver::new(&config.geo_db.path)?);
            let engine = DetectionEngine::from_config(&config, store, resolver);
            let mut output = OutputHandler::new(OutputFormat::parse(&format), None)?;

            let mut tailer = FileTailer::new(file, StartPosition::Beginning);
            let events = tailer.read_events()?;

            let (mut suspicious, mut rejected) = (0, 0);
            for event in &events {
                match engine.process_event(event.clone()).await {
                    Ok(result) => {
                        if result.is_suspicious() {
                            suspicious += 1;
                        }
                        output.write_record(&DetectionRecord::new(event.clone(), result))?;
                    }
                    Err(e) => {
                        rejected += 1;
                        log::error!("Rejected event {}: {}", event.id(), e);
                    }
                }
            }
            output.flush()?;

            eprintln!(
                "Replayed {} event(s): {} suspicious, {} rejected",
                events.len(),
                suspicious,
                rejected
            );
        }
        Cli::History {
            username,
            config,
            limit,
        } => {
            let config = Config::load(&config)?;
            let store = SqliteEventStore::new(&config.event_db.path)?;
            let events = store.scan_by_user(&username)?;
            let skip = events.len().saturating_sub(limit);

            println!("{} event(s) for {} (showing {}):\n", events.len(), username, events.len() - skip);
            for event in events.iter().skip(skip) {
                let when = Utc
                    .timestamp_opt(event.timestamp(), 0)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| event.timestamp().to_string());
                println!("  {}  IP: {:<39}  Event: {}", when, event.source_ip(), event.id());
            }
        }
        Cli::Distance { from, to } => {
            let distance = HaversineCalculator.distance(&from, &to)?;
            println!("{:.2} km", distance.kilometers);
            println!("{:.2} mi", distance.miles);
        }
        Cli::Generate { num, output, seed } => {
            let writer: Box<dyn Write> = match output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(io::stdout().lock()),
            };
            match seed {
                Some(seed) => write_generated(EventGenerator::with_rng(StdRng::seed_from_u64(seed)), num, writer)?,
                None => write_generated(EventGenerator::new(), num, writer)?,
            }
        }
    }

    Ok(())
}

fn write_generated<R: Rng>(
    mut generator: EventGenerator<R>,
    per_user: usize,
    mut writer: Box<dyn Write>,
) -> Result<(), Box<dyn std::error::Error>> {
    for info in generator.generate(per_user) {
        writeln!(writer, "{}", serde_json::to_string(&info)?)?;
    }
    writer.flush()?;
    Ok(())
}
