use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Environment variable naming the config file the daemon should load
pub const CONFIG_ENV: &str = "HERMES_CONFIG";

const SPEED_ENV: &str = "HERMES_SUSPICIOUS_SPEED";
const EVENT_DB_ENV: &str = "HERMES_EVENT_DB";
const GEO_DB_ENV: &str = "HERMES_GEO_DB";

/// Errors that can occur while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the Hermes daemon and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Detection thresholds
    pub detection: DetectionConfig,
    /// Event database
    pub event_db: EventDbConfig,
    /// GeoIP database
    pub geo_db: GeoDbConfig,
    /// Input source configuration
    pub input: InputConfig,
    /// Output configuration
    pub output: OutputConfig,
}

/// Detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Travel at or above this speed (mph) is suspicious
    pub suspicious_speed_mph: f64,
}

/// Event database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDbConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
    /// Maximum concurrent operations against the database
    pub max_connections: usize,
}

/// GeoIP database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoDbConfig {
    /// Path to the GeoLite2-City.mmdb file
    pub path: PathBuf,
    /// Maximum concurrent lookups
    pub max_connections: usize,
}

/// Input source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// JSON-lines file of ingestion payloads to tail
    pub file_path: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (stdout if unset or format is "console")
    pub file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            detection: DetectionConfig {
                suspicious_speed_mph: 500.0,
            },
            event_db: EventDbConfig {
                path: PathBuf::from("hermes-events.db"),
                max_connections: 200,
            },
            geo_db: GeoDbConfig {
                path: PathBuf::from("GeoLite2-City.mmdb"),
                max_connections: 200,
            },
            input: InputConfig {
                file_path: Some(PathBuf::from("events.jsonl")),
            },
            output: OutputConfig {
                format: "jsonl".to_string(),
                file_path: Some(PathBuf::from("verdicts.jsonl")),
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from `path` if it exists, otherwise start from defaults, then
    /// apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Config::from_file(path)?
        } else {
            log::warn!("Config file {} not found, using defaults", path.display());
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override settings from `lookup` (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(speed) = lookup(SPEED_ENV) {
            self.detection.suspicious_speed_mph = speed.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number, got '{}'", SPEED_ENV, speed))
            })?;
        }
        if let Some(path) = lookup(EVENT_DB_ENV) {
            self.event_db.path = PathBuf::from(path);
        }
        if let Some(path) = lookup(GEO_DB_ENV) {
            self.geo_db.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let speed = self.detection.suspicious_speed_mph;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "suspicious_speed_mph must be a positive number, got {}",
                speed
            )));
        }
        check_connections("event_db", self.event_db.max_connections)?;
        check_connections("geo_db", self.geo_db.max_connections)?;
        Ok(())
    }
}

fn check_connections(section: &str, max_connections: usize) -> Result<(), ConfigError> {
    if max_connections == 0 || max_connections > Semaphore::MAX_PERMITS {
        return Err(ConfigError::Invalid(format!(
            "{}.max_connections must be between 1 and {}, got {}",
            section,
            Semaphore::MAX_PERMITS,
            max_connections
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.suspicious_speed_mph, 500.0);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hermes.toml");

        let mut config = Config::default();
        config.detection.suspicious_speed_mph = 650.0;
        config.output.file_path = None;
        config.to_file(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [detection]
            suspicious_speed_mph = 300.0

            [event_db]
            path = "/var/lib/hermes/events.db"
            max_connections = 10

            [geo_db]
            path = "/usr/share/GeoIP/GeoLite2-City.mmdb"
            max_connections = 4

            [input]

            [output]
            format = "console"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.detection.suspicious_speed_mph, 300.0);
        assert_eq!(config.event_db.max_connections, 10);
        assert_eq!(config.geo_db.path, PathBuf::from("/usr/share/GeoIP/GeoLite2-City.mmdb"));
        assert!(config.input.file_path.is_none());
        assert!(config.output.file_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("HERMES_SUSPICIOUS_SPEED", "750"),
            ("HERMES_EVENT_DB", "/tmp/events.db"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.detection.suspicious_speed_mph, 750.0);
        assert_eq!(config.event_db.path, PathBuf::from("/tmp/events.db"));
        assert_eq!(config.geo_db.path, PathBuf::from("GeoLite2-City.mmdb"));
    }

    #[test]
    fn test_bad_speed_override() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| (key == "HERMES_SUSPICIOUS_SPEED").then(|| "fast".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.detection.suspicious_speed_mph = 0.0;
        assert!(config.validate().is_err());

        config.detection.suspicious_speed_mph = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.geo_db.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_pool() {
        let toml = r#"
            [detection]
            suspicious_speed_mph = 500.0

            [event_db]
            path = "events.db"
            max_connections = 4611686018427387904

            [geo_db]
            path = "GeoLite2-City.mmdb"
            max_connections = 200

            [input]

            [output]
            format = "jsonl"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.geo_db.max_connections = Semaphore::MAX_PERMITS;
        assert!(config.validate().is_ok());
        config.geo_db.max_connections = Semaphore::MAX_PERMITS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.event_db.max_connections, 200);
    }
}
