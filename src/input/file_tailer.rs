use crate::models::Event;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

/// Where a tailer starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Replay every line already in the file
    Beginning,
    /// Only pick up lines appended after opening
    End,
}

/// Read ingestion payloads, one JSON object per line, from a file
pub struct FileTailer {
    file_path: PathBuf,
    start: StartPosition,
    reader: Option<BufReader<File>>,
    partial: Vec<u8>,
}

impl FileTailer {
    /// Create a new file tailer
    pub fn new(file_path: PathBuf, start: StartPosition) -> Self {
        FileTailer {
            file_path,
            start,
            reader: None,
            partial: Vec::new(),
        }
    }

    /// Open the file and move to the start position
    pub fn initialize(&mut self) -> io::Result<()> {
        let file = File::open(&self.file_path)?;
        let mut reader = BufReader::new(file);

        if self.start == StartPosition::End {
            reader.seek(SeekFrom::End(0))?;
        }
        self.reader = Some(reader);
        self.partial.clear();

        Ok(())
    }

    /// Read the events on all complete lines available so far
    ///
    /// Lines that are not valid payloads are logged and skipped. A trailing
    /// line without a newline is held back until it is completed.
    pub fn read_events(&mut self) -> io::Result<Vec<Event>> {
        if self.reader.is_none() {
            self.initialize()?;
        }

        let mut events = Vec::new();
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(events),
        };

        loop {
            let bytes_read = reader.read_until(b'\n', &mut self.partial)?;
            if bytes_read == 0 || !self.partial.ends_with(b"\n") {
                break;
            }

            if let Some(event) = decode_line(&self.partial) {
                events.push(event);
            }
            self.partial.clear();
        }

        Ok(events)
    }

    /// Check if the file still exists
    pub fn is_valid(&self) -> bool {
        self.file_path.exists()
    }
}

/// Decode one raw line; non-UTF-8 input is logged and skipped
pub fn decode_line(bytes: &[u8]) -> Option<Event> {
    match std::str::from_utf8(bytes) {
        Ok(line) => parse_line(line),
        Err(e) => {
            log::warn!("Skipping event line that is not valid UTF-8: {}", e);
            None
        }
    }
}

/// Decode one line; blank lines are ignored and bad payloads logged
pub fn parse_line(line: &str) -> Option<Event> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<Event>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            log::warn!("Skipping invalid event payload: {} ({})", e, line);
            None
        }
    }
}

// ============================================
// Async File Tailer
// ============================================

use tokio::fs::File as AsyncFile;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader as AsyncBufReader};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Async version of FileTailer for use with tokio
pub struct AsyncFileTailer {
    file_path: PathBuf,
    start: StartPosition,
}

impl AsyncFileTailer {
    /// Create a new async file tailer
    pub fn new(file_path: PathBuf, start: StartPosition) -> Self {
        AsyncFileTailer { file_path, start }
    }

    /// Run the file tailer, sending events through the channel
    ///
    /// This method runs until the receiving side of the channel is dropped.
    pub async fn run(&mut self, tx: mpsc::Sender<Event>) -> io::Result<()> {
        let file = AsyncFile::open(&self.file_path).await?;
        let mut reader = AsyncBufReader::new(file);

        if self.start == StartPosition::End {
            reader.seek(io::SeekFrom::End(0)).await?;
        }

        log::info!("Async file tailer started for {:?}", self.file_path);

        let mut line = Vec::new();
        loop {
            if tx.is_closed() {
                log::info!("Channel closed, stopping file tailer");
                break;
            }

            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => sleep(POLL_INTERVAL).await,
                Ok(_) if !line.ends_with(b"\n") => sleep(POLL_INTERVAL).await,
                Ok(_) => {
                    if let Some(event) = decode_line(&line) {
                        if tx.send(event).await.is_err() {
                            log::info!("Channel closed, stopping file tailer");
                            break;
                        }
                    }
                    line.clear();
                }
                Err(e) => {
                    log::error!("Error reading file: {}", e);
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }

        Ok(())
    }
}
