use crate::models::{Event, SuspiciousTravelResult};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A processed event together with its verdict
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRecord {
    pub event: Event,
    pub result: SuspiciousTravelResult,
}

impl DetectionRecord {
    pub fn new(event: Event, result: SuspiciousTravelResult) -> Self {
        DetectionRecord { event, result }
    }
}

/// Output handler for detection records
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    /// Parse a format name; unknown names fall back to jsonl
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            other => {
                log::warn!("Unknown output format '{}', using jsonl", other);
                OutputFormat::Jsonl
            }
        }
    }
}

impl OutputHandler {
    /// Create a new output handler; records go to stdout when no file is set
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, OutputError> {
        let writer: Option<Box<dyn Write + Send>> = match (format, file_path) {
            (OutputFormat::Console, _) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Write to an arbitrary sink instead of a file
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write a detection record
    pub fn write_record(&mut self, record: &DetectionRecord) -> Result<(), OutputError> {
        let output = match self.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(record)?),
            OutputFormat::Jsonl => format!("{}\n", serde_json::to_string(record)?),
            OutputFormat::Console => console_line(record),
        };
        self.write_output(&output)
    }

    fn write_output(&mut self, data: &str) -> Result<(), OutputError> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(data.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), OutputError> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

fn console_line(record: &DetectionRecord) -> String {
    let event = &record.event;
    let result = &record.result;
    let geo = result.current_geo();

    let mut line = format!(
        "[{}] {} - User: {}, IP: {} ({:.4}, {:.4} r{})",
        if result.is_suspicious() { "SUSPICIOUS" } else { "ok" },
        event.id(),
        event.username(),
        event.source_ip(),
        geo.latitude,
        geo.longitude,
        geo.accuracy_radius,
    );
    if let (Some(access), Some(flag)) = (result.preceding_access(), result.travel_to_current_suspicious()) {
        line.push_str(&format!(", from {} at {} mph{}", access.ip, access.speed, if flag { " !" } else { "" }));
    }
    if let (Some(access), Some(flag)) = (result.subsequent_access(), result.travel_from_current_suspicious()) {
        line.push_str(&format!(", to {} at {} mph{}", access.ip, access.speed, if flag { " !" } else { "" }));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventInfo, GeoPoint, RelatedAccessInfo};

    fn record() -> DetectionRecord {
        let event = Event::new(EventInfo {
            uuid: "85ad929a-db03-4bf4-9541-8f728fa12e42".to_string(),
            username: "bob".to_string(),
            timestamp: 1514851200,
            ip: "91.207.175.104".to_string(),
        })
        .unwrap();
        let previous = Event::new(EventInfo {
            uuid: "85ad929a-db03-4bf4-9541-8f728fa12e41".to_string(),
            username: "bob".to_string(),
            timestamp: 1514764800,
            ip: "206.81.252.6".to_string(),
        })
        .unwrap();

        let mut result = SuspiciousTravelResult::new(GeoPoint::new(34.0549, -118.2578, 200));
        result.set_preceding(
            RelatedAccessInfo::new(&previous, &GeoPoint::new(30.5334, -95.4559, 1000), 56.0),
            false,
        );
        DetectionRecord::new(event, result)
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("console"), OutputFormat::Console);
        assert_eq!(OutputFormat::parse("xml"), OutputFormat::Jsonl);
    }

    #[test]
    fn test_jsonl_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdicts.jsonl");

        let mut handler = OutputHandler::new(OutputFormat::Jsonl, Some(path.clone())).unwrap();
        handler.write_record(&record()).unwrap();
        handler.write_record(&record()).unwrap();
        handler.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["event"]["username"], "bob");
        assert_eq!(value["event"]["ip_address"], "91.207.175.104");
        assert_eq!(value["result"]["currentGeo"]["radius"], 200);
        assert_eq!(value["result"]["travelToCurrentGeoSuspicious"], false);
        assert_eq!(value["result"]["precedingIpAccess"]["speed"], 56.0);
        assert!(value["result"].get("subsequentIpAccess").is_none());
    }

    #[test]
    fn test_json_output_is_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verdicts.json");

        let mut handler = OutputHandler::new(OutputFormat::Json, Some(path.clone())).unwrap();
        handler.write_record(&record()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().count() > 1);
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["event"]["unix_timestamp"], 1514851200);
    }

    #[test]
    fn test_console_line() {
        let line = console_line(&record());
        assert!(line.starts_with("[ok] 85ad929a-db03-4bf4-9541-8f728fa12e42 - User: bob"));
        assert!(line.contains("from 206.81.252.6 at 56 mph"));
        assert!(line.ends_with('\n'));
    }
}
