use crate::source::timestamp::{format_db_timestamp, parse_db_timestamp, TimestampError};
use chrono::NaiveDateTime;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read watermark file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watermark file '{path}' has unreadable content '{content}': {source}")]
    Corrupt {
        path: PathBuf,
        content: String,
        #[source]
        source: TimestampError,
    },

    #[error("failed to write watermark file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, PersistError>;

/// Timestamp of the most recently processed source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(NaiveDateTime);

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_db_timestamp(&self.0))
    }
}

impl FromStr for Watermark {
    type Err = TimestampError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_db_timestamp(s).map(Self)
    }
}

/// Plain-text file holding the single watermark value.
///
/// No locking of its own: callers only touch it while holding the run lock.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored watermark.
    ///
    /// A missing or blank file is the empty state. Any other read failure, or
    /// content that does not parse, is an error rather than a silent reset.
    pub fn load(&self) -> Result<Option<Watermark>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No watermark file, starting fresh");
                return Ok(None);
            }
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let trimmed = content.trim();
        if trimmed.is_empty() {
            tracing::debug!(path = %self.path.display(), "Watermark file is empty");
            return Ok(None);
        }

        let watermark = trimmed.parse().map_err(|source| PersistError::Corrupt {
            path: self.path.clone(),
            content: trimmed.to_string(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), watermark = %watermark, "Loaded watermark");
        Ok(Some(watermark))
    }

    /// Replaces the stored watermark.
    ///
    /// Writes to a temp file in the same directory and renames it over the old
    /// one, so a crash mid-write leaves the previous value intact.
    pub fn save(&self, watermark: &Watermark) -> Result<()> {
        let write_err = |source| PersistError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        writeln!(tmp, "{watermark}").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        tracing::debug!(path = %self.path.display(), watermark = %watermark, "Saved watermark");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn wm(s: &str) -> Watermark {
        s.parse().unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("etl.last"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_blank_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etl.last");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(WatermarkStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("etl.last"));

        store.save(&wm("2016-04-05 10:10:00")).unwrap();
        assert_eq!(store.load().unwrap(), Some(wm("2016-04-05 10:10:00")));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "2016-04-05 10:10:00\n");
    }

    #[test]
    fn test_save_overwrites_in_full() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("etl.last"));

        store.save(&wm("2016-04-05 10:10:00.123456")).unwrap();
        store.save(&wm("2016-04-05 10:15:00")).unwrap();

        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "2016-04-05 10:15:00\n"
        );
        // Only the watermark file remains; the temp file was renamed away.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_corrupt_content_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etl.last");
        std::fs::write(&path, "not a timestamp").unwrap();

        let err = WatermarkStore::new(path).load().unwrap_err();
        assert!(matches!(err, PersistError::Corrupt { ref content, .. } if content == "not a timestamp"));
    }

    #[test]
    fn test_directory_in_place_of_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etl.last");
        std::fs::create_dir(&path).unwrap();

        let err = WatermarkStore::new(path).load().unwrap_err();
        assert!(matches!(err, PersistError::Read { .. }));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(dir.path().join("missing").join("etl.last"));
        let err = store.save(&wm("2016-04-05 10:10:00")).unwrap_err();
        assert!(matches!(err, PersistError::Write { .. }));
    }

    #[test]
    fn test_watermark_ordering_follows_time() {
        assert!(wm("2016-04-05 10:10:00") < wm("2016-04-05 10:15:00"));
        assert_eq!(wm("2016-04-05T10:10:00"), wm("2016-04-05 10:10:00"));
    }
}
