use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use engine_logging::{engine_info, engine_warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Append-only record of every item id that has been delivered.
///
/// One opaque id per line, UTF-8. The file is never rewritten or compacted;
/// lines flushed before a crash stay visible on the next load, which is what
/// makes interrupted runs safe to repeat.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot of every recorded id. A missing file is the first run, not
    /// an error; an unreadable one degrades to empty with a warning, since
    /// the worst outcome is a re-published duplicate rather than data loss.
    pub fn load(&self) -> HashSet<String> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return HashSet::new(),
            Err(err) => {
                engine_warn!("failed to read ledger {:?}: {err}", self.path);
                return HashSet::new();
            }
        };
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Record ids as delivered. Additive only; callers pass confirmed
    /// successes exclusively.
    pub fn append(&self, ids: &[String]) -> Result<(), LedgerError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for id in ids {
            writeln!(file, "{id}")?;
        }
        file.flush()?;
        engine_info!("recorded {} delivered items in {:?}", ids.len(), self.path);
        Ok(())
    }
}
