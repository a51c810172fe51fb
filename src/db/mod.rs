// src/db/mod.rs

//! Package database for Flux
//!
//! The database is a flat directory holding one record file per installed
//! package, named exactly after the package. The presence of a record is the
//! only notion of "installed" there is.

pub mod lock;
pub mod models;

use crate::error::{Error, Result};
use models::PackageRecord;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use lock::DbLock;

/// Check that `name` can be used as a record filename
///
/// Names must be non-empty, must not contain path separators or control
/// characters, and must not start with `.` (reserved for the lock file and
/// in-flight writes).
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.chars().any(char::is_control);

    if invalid {
        return Err(Error::InvalidPackageName(name.to_string()));
    }
    Ok(())
}

/// Handle to a package database directory
#[derive(Debug, Clone)]
pub struct PackageDb {
    root: PathBuf,
}

impl PackageDb {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Whether a record exists for `name`
    pub fn exists(&self, name: &str) -> bool {
        self.record_path(name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Read the record for `name`
    pub fn read(&self, name: &str) -> Result<PackageRecord> {
        let path = self.record_path(name)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(name.to_string()));
            }
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read record {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        content.parse().map_err(|e| match e {
            Error::ParseError(msg) => Error::ParseError(format!("{}: {}", name, msg)),
            other => other,
        })
    }

    /// Write (fully replace) the record for `name`
    ///
    /// The record is written to a temporary file in the database directory
    /// and renamed into place, so readers never observe a truncated record.
    pub fn write(&self, name: &str, record: &PackageRecord) -> Result<()> {
        let path = self.record_path(name)?;
        let content = record
            .encode()
            .map_err(|e| match e {
                Error::ParseError(msg) => Error::ParseError(format!("{}: {}", name, msg)),
                other => other,
            })?;

        fs::create_dir_all(&self.root).map_err(|e| {
            Error::IoError(format!(
                "Failed to create database directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| Error::IoError(format!("Failed to create temporary record: {}", e)))?;

        temp.write_all(content.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| Error::IoError(format!("Failed to write record for {}: {}", name, e)))?;

        temp.persist(&path).map_err(|e| {
            Error::IoError(format!(
                "Failed to move record into {}: {}",
                path.display(),
                e.error
            ))
        })?;

        debug!("Wrote record for {} ({} entries)", name, record.entries.len());
        Ok(())
    }

    /// Delete the record for `name`
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.record_path(name)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted record for {}", name);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(name.to_string())),
            Err(e) => Err(Error::IoError(format!(
                "Failed to delete record {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Names of all installed packages, sorted
    ///
    /// Only regular files with a valid package name count as packages; a
    /// missing database directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to read database directory {}: {}",
                    self.root.display(),
                    e
                )));
            }
        };

        let mut names = Vec::new();
        for entry in dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_name(&name).is_ok() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::TrackedEntry;

    fn sample_record(version: &str) -> PackageRecord {
        PackageRecord::new(
            version.to_string(),
            Vec::new(),
            vec![TrackedEntry::File("/usr/bin/hello".to_string())],
        )
    }

    #[test]
    fn test_write_read_exists_delete() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path().join("db"));

        assert!(!db.exists("hello"));
        db.write("hello", &sample_record("1.0")).unwrap();
        assert!(db.exists("hello"));
        assert_eq!(db.read("hello").unwrap(), sample_record("1.0"));

        db.write("hello", &sample_record("2.0")).unwrap();
        assert_eq!(db.read("hello").unwrap().version, "2.0");

        db.delete("hello").unwrap();
        assert!(!db.exists("hello"));
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());

        assert!(matches!(db.read("ghost"), Err(Error::NotFound(n)) if n == "ghost"));
        assert!(matches!(db.delete("ghost"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_only_counts_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());

        db.write("zlib", &sample_record("1")).unwrap();
        db.write("bash", &sample_record("5")).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        fs::write(dir.path().join(".lock"), b"").unwrap();

        assert_eq!(db.list().unwrap(), vec!["bash".to_string(), "zlib".to_string()]);
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path().join("never-created"));
        assert!(db.list().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_names_rejected() {
        for name in ["", "../etc/passwd", "a/b", ".hidden", "nul\0byte", "two\nlines"] {
            assert!(matches!(
                validate_name(name),
                Err(Error::InvalidPackageName(_))
            ));
        }
        assert!(validate_name("lib-foo_2.0+git").is_ok());

        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());
        assert!(!db.exists("../escape"));
        assert!(matches!(
            db.write("a/b", &sample_record("1")),
            Err(Error::InvalidPackageName(_))
        ));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());

        db.write("hello", &sample_record("1.0")).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("hello")]);
    }

    #[test]
    fn test_write_refuses_unencodable_record() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());
        let record = PackageRecord::new(
            "1.0".to_string(),
            Vec::new(),
            vec![TrackedEntry::File("/usr/bin/x\n/etc/shadow".to_string())],
        );

        assert!(matches!(db.write("evil", &record), Err(Error::ParseError(_))));
        assert!(!db.exists("evil"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
