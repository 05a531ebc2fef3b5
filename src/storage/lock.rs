use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file '{0}' is held by another run")]
    Busy(PathBuf),

    #[error("failed to open lock file '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock '{path}': {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Cross-process mutual exclusion over one pipeline's critical section,
/// backed by an advisory lock on a file.
///
/// The OS drops the lock when the holding process exits, so a killed run
/// never leaves it stuck.
pub struct RunLock {
    path: PathBuf,
    file: RwLock<File>,
}

/// Proof of exclusive ownership. Dropping it releases the lock.
pub struct RunLockGuard<'a> {
    path: &'a Path,
    _guard: RwLockWriteGuard<'a, File>,
}

impl RunLock {
    /// Opens (creating if needed) the lock file. Does not lock it.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, LockError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: RwLock::new(file),
        })
    }

    /// Takes the lock without waiting. Returns `LockError::Busy` if another
    /// holder has it.
    pub fn try_acquire(&mut self) -> Result<RunLockGuard<'_>, LockError> {
        match self.file.try_write() {
            Ok(guard) => {
                tracing::debug!(path = %self.path.display(), "Acquired run lock");
                Ok(RunLockGuard {
                    path: &self.path,
                    _guard: guard,
                })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(LockError::Busy(self.path.clone())),
            Err(source) => Err(LockError::Lock {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for RunLockGuard<'_> {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "Released run lock");
    }
}
