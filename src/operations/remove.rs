// src/operations/remove.rs

use super::PackageManager;
use crate::db::{DbLock, validate_name};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::resolver;
use tracing::{info, warn};

/// Result of removing a package
#[derive(Debug)]
pub struct RemoveReport {
    pub name: String,
    pub version: String,
    /// Tracked entries deleted (or already absent)
    pub removed: usize,
    /// Entries left on disk, as `path: reason`
    pub failures: Vec<String>,
}

impl PackageManager {
    /// Remove an installed package and every file it placed
    ///
    /// Fails without touching anything when another installed package
    /// depends on `name`. Individual file deletions are best effort; the
    /// record is deleted even if some files remain.
    pub fn remove(&self, name: &str) -> Result<RemoveReport> {
        validate_name(name)?;
        let _lock = DbLock::acquire(&self.config.db_dir)?;
        self.remove_locked(name)
    }

    pub(crate) fn remove_locked(&self, name: &str) -> Result<RemoveReport> {
        let record = self.db.read(name)?;

        let dependents = resolver::reverse_dependencies(&self.db, name)?;
        if !dependents.is_empty() {
            return Err(Error::DependencyConflict {
                package: name.to_string(),
                dependents,
            });
        }

        let summary = filesystem::remove_entries(&self.config.root, &record.entries);
        self.db.delete(name)?;

        if summary.failures.is_empty() {
            info!("Removed {} {}", name, record.version);
        } else {
            warn!(
                "Removed {} {}; {} file(s) could not be deleted",
                name,
                record.version,
                summary.failures.len()
            );
        }

        Ok(RemoveReport {
            name: name.to_string(),
            version: record.version,
            removed: summary.removed,
            failures: summary.failures,
        })
    }
}
