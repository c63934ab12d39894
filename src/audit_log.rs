/// Append-only audit log of move attempts.
///
/// Every attempt produces one [`LogRecord`]. Records are kept in memory for
/// the run summary and appended to the log file as JSON lines, one object
/// per line:
///
/// ```text
/// {"timestamp":"2024-03-09T12:00:00Z","source":"/in/a.pdf","destination":"/in/Organized/Documents/a.pdf","outcome":"moved","reason":""}
/// ```
use crate::planner::MovePlan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Final state of one move attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The file was moved to its destination.
    Moved,
    /// Nothing was done (dry-run).
    Skipped,
    /// The move was attempted and failed.
    Failed,
    /// A previous move was reverted by undo.
    Restored,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Moved => "moved",
            Outcome::Skipped => "skipped",
            Outcome::Failed => "failed",
            Outcome::Restored => "restored",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "path_repr")]
    pub source: PathBuf,
    /// Empty when the move failed.
    #[serde(with = "path_repr")]
    pub destination: PathBuf,
    /// Category the file was planned into; absent for undo records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub outcome: Outcome,
    /// Empty on success.
    #[serde(default)]
    pub reason: String,
}

impl LogRecord {
    fn new(source: PathBuf, destination: PathBuf, outcome: Outcome, reason: String) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            destination,
            category: None,
            outcome,
            reason,
        }
    }

    /// A completed move.
    pub fn moved(plan: &MovePlan) -> Self {
        Self::new(
            plan.source.clone(),
            plan.destination.clone(),
            Outcome::Moved,
            String::new(),
        )
        .with_category(&plan.category)
    }

    /// A move that was deliberately not performed.
    pub fn skipped(plan: &MovePlan, reason: impl Into<String>) -> Self {
        Self::new(
            plan.source.clone(),
            plan.destination.clone(),
            Outcome::Skipped,
            reason.into(),
        )
        .with_category(&plan.category)
    }

    /// A failed move; the destination is left empty.
    pub fn failed(plan: &MovePlan, reason: impl Into<String>) -> Self {
        Self::new(
            plan.source.clone(),
            PathBuf::new(),
            Outcome::Failed,
            reason.into(),
        )
        .with_category(&plan.category)
    }

    /// A file put back by undo: `source` is where it was, `destination` where it is now.
    pub fn restored(source: PathBuf, destination: PathBuf) -> Self {
        Self::new(source, destination, Outcome::Restored, String::new())
    }

    fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

/// Paths are written as JSON strings when they are valid UTF-8 and as an
/// array of raw bytes otherwise, so every file name survives a round trip.
mod path_repr {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::path::{Path, PathBuf};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<P: AsRef<Path>, S: Serializer>(
        path: &P,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let path = path.as_ref();
        match path.to_str() {
            Some(text) => serializer.serialize_str(text),
            None => serialize_raw(path, serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Ok(PathBuf::from(text)),
            Repr::Bytes(bytes) => path_from_raw(bytes),
        }
    }

    #[cfg(unix)]
    fn serialize_raw<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
        use std::os::unix::ffi::OsStrExt;
        serializer.collect_seq(path.as_os_str().as_bytes())
    }

    #[cfg(not(unix))]
    fn serialize_raw<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&path.to_string_lossy())
    }

    #[cfg(unix)]
    fn path_from_raw<E: serde::de::Error>(bytes: Vec<u8>) -> Result<PathBuf, E> {
        use std::os::unix::ffi::OsStringExt;
        Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
    }

    #[cfg(not(unix))]
    fn path_from_raw<E: serde::de::Error>(bytes: Vec<u8>) -> Result<PathBuf, E> {
        String::from_utf8(bytes)
            .map(PathBuf::from)
            .map_err(E::custom)
    }
}

/// Errors reading an audit log back.
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("could not read audit log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid audit log {} line {line}: {reason}", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// In-memory record list with an optional backing file.
#[derive(Debug)]
pub struct AuditLog {
    path: Option<PathBuf>,
    records: Vec<LogRecord>,
    flushed: usize,
}

impl AuditLog {
    /// A log that appends to `path` on flush.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            records: Vec::new(),
            flushed: 0,
        }
    }

    /// A log that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Vec::new(),
            flushed: 0,
        }
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends a record to the in-memory list.
    pub fn record(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    /// All records of this run, oldest first.
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Number of records not yet written to the backing file.
    pub fn pending(&self) -> usize {
        self.records.len() - self.flushed
    }

    /// Appends every record not yet written to the backing file.
    ///
    /// The parent directory is created if needed. On error the pending records
    /// stay pending, so a later flush retries them.
    pub fn flush(&mut self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            self.flushed = self.records.len();
            return Ok(());
        };
        if self.flushed == self.records.len() {
            return Ok(());
        }

        let mut buffer = String::new();
        for record in &self.records[self.flushed..] {
            let line = serde_json::to_string(record)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(buffer.as_bytes())?;

        self.flushed = self.records.len();
        Ok(())
    }

    /// Reads every record of an audit log file.
    ///
    /// Blank lines are ignored.
    pub fn load(path: &Path) -> Result<Vec<LogRecord>, AuditLogError> {
        let content = fs::read_to_string(path).map_err(|source| AuditLogError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| AuditLogError::Format {
                    path: path.to_path_buf(),
                    line: index + 1,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
