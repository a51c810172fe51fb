// src/db/lock.rs

//! Advisory lock over a package database
//!
//! Install, remove and update hold an exclusive `flock` on `<db_dir>/.lock`
//! for their whole duration so two flux processes never interleave file
//! placement or record writes on the same root. The lock is released when
//! the guard is dropped.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the lock file inside the database directory
pub const LOCK_FILE: &str = ".lock";

/// Held exclusive lock; released on drop
#[derive(Debug)]
pub struct DbLock {
    file: File,
    path: PathBuf,
}

impl DbLock {
    /// Acquire the lock without blocking
    ///
    /// Fails with [`Error::Locked`] when another process holds it.
    pub fn acquire(db_dir: &Path) -> Result<Self> {
        fs::create_dir_all(db_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create database directory {}: {}",
                db_dir.display(),
                e
            ))
        })?;

        let path = db_dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::IoError(format!("Failed to open lock {}: {}", path.display(), e)))?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                let holder = holder.trim();
                return Err(Error::Locked(if holder.is_empty() {
                    path.display().to_string()
                } else {
                    format!("{}: {}", path.display(), holder)
                }));
            }
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        // Holder details are diagnostics only
        let stamp = format!(
            "pid {} since {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        if let Err(e) = file.set_len(0).and_then(|_| file.write_all(stamp.as_bytes())) {
            warn!("Failed to record lock holder in {}: {}", path.display(), e);
        }

        debug!("Acquired database lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DbLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            debug!("Released database lock {}", self.path.display());
        }
    }
}
