//! Durable request history
//!
//! Append-only log of every observed event, one JSON record per line,
//! replayed at startup to rebuild the trailing window after a restart.
//! The file is opened once in append mode, created if absent, and never
//! truncated or rewritten.
//!
//! Persistence is at-least-once while the process stays alive: a hard kill
//! without the shutdown flush may lose the most recent unflushed records.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::{Event, METER_WINDOW};
use crate::{MeterError, Result};

/// Request history filename used by default, in the working directory
pub const HISTORY_FILENAME: &str = "req.his";

/// Append-only on-disk log of observed request events
#[derive(Debug)]
pub struct HistoryLog {
    file: File,
    path: PathBuf,
}

impl HistoryLog {
    /// Open or create the history file in append mode.
    ///
    /// Failure here is startup-fatal: the caller must not serve traffic
    /// without a working history log.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// Append one event as a single JSON line
    pub fn append(&mut self, event: &Event) -> Result<()> {
        let record = serde_json::to_string(event)
            .map_err(|e| MeterError::History(format!("serialize request info: {e}")))?;
        writeln!(self.file, "{record}")?;
        Ok(())
    }

    /// Replay the log from its start, returning every event whose timestamp
    /// falls inside the trailing window ending at `now`. Older records are
    /// silently skipped and left on disk.
    ///
    /// A malformed line aborts replay: the caller must not proceed to serve
    /// traffic.
    pub fn replay(&mut self, now: i64) -> Result<Vec<Event>> {
        let cutoff = now - METER_WINDOW.as_nanos() as i64;

        self.file.seek(SeekFrom::Start(0))?;
        let reader = BufReader::new(&self.file);

        let mut recent = Vec::new();
        for (num, line) in reader.lines().enumerate() {
            let line = line?;
            let event: Event = serde_json::from_str(&line).map_err(|e| {
                MeterError::Replay(format!(
                    "{}: malformed record at line {}: {e}",
                    self.path.display(),
                    num + 1
                ))
            })?;

            // Skip data older than the window
            if event.time >= cutoff {
                recent.push(event);
            }
        }

        Ok(recent)
    }

    /// Flush file data to disk. Called once during graceful shutdown to
    /// capture the tail of the log.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
