//! Persists REPL input lines across sessions. Not a line-editor: just an append-only
//! log with a retained-length cap, loaded on enable and flushed on disable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::DebuggerError;

const MAX_ENTRIES: usize = 2048;
const HISTORY_FILE_NAME: &str = ".magicdbg_history";

pub struct History {
    path: PathBuf,
    lines: Vec<String>,
    loaded_len: usize,
}

impl History {
    /// Load history from `${HOME}/.magicdbg_history`, creating the file if it is
    /// missing. Any I/O failure during load is treated as "start empty", matching the
    /// spec's "never fatal" stance on history errors.
    pub fn load(home: &Path) -> Self {
        let path = home.join(HISTORY_FILE_NAME);
        let lines = match fs::read_to_string(&path) {
            Ok(contents) => contents.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(create_err) = fs::File::create(&path) {
                    warn!(path = %path.display(), error = %create_err, "could not create history file");
                }
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not load history file");
                Vec::new()
            }
        };
        let loaded_len = lines.len();
        History { path, lines, loaded_len }
    }

    /// Record a submitted REPL line, trimming the oldest entries past the retention cap.
    pub fn record(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        self.lines.push(line.to_string());
        if self.lines.len() > MAX_ENTRIES {
            let overflow = self.lines.len() - MAX_ENTRIES;
            self.lines.drain(0..overflow);
            self.loaded_len = self.loaded_len.saturating_sub(overflow);
        }
    }

    /// Append only the lines recorded since `load`, leaving prior history untouched.
    pub fn flush(&self) -> Result<(), DebuggerError> {
        let added = &self.lines[self.loaded_len.min(self.lines.len())..];
        if added.is_empty() {
            return Ok(());
        }
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|source| DebuggerError::HistoryIo { path: self.path.display().to_string(), source })?;
        for line in added {
            writeln!(file, "{line}")
                .map_err(|source| DebuggerError::HistoryIo { path: self.path.display().to_string(), source })?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
