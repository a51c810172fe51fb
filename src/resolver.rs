// src/resolver.rs

//! Dependency checks against the package database
//!
//! Dependencies are plain package names. A dependency is satisfied when a
//! record for it exists; recorded versions are not consulted.

use crate::db::PackageDb;
use crate::error::{Error, Result};
use tracing::debug;

/// Ensure every entry of `depends` is installed
///
/// All missing names are collected (in declaration order) and reported
/// together rather than stopping at the first one.
pub fn validate(db: &PackageDb, name: &str, depends: &[String]) -> Result<()> {
    let missing: Vec<String> = depends
        .iter()
        .filter(|dep| !db.exists(dep))
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(Error::MissingDependencies {
            package: name.to_string(),
            missing,
        });
    }

    debug!("All {} dependencies of {} are installed", depends.len(), name);
    Ok(())
}

/// Installed packages whose records list `name` as a dependency
pub fn reverse_dependencies(db: &PackageDb, name: &str) -> Result<Vec<String>> {
    let mut dependents = Vec::new();

    for other in db.list()? {
        if other == name {
            continue;
        }
        if db.read(&other)?.depends_on(name) {
            dependents.push(other);
        }
    }

    Ok(dependents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PackageRecord;

    fn install(db: &PackageDb, name: &str, depends: &[&str]) {
        let depends = depends.iter().map(|d| d.to_string()).collect();
        db.write(name, &PackageRecord::new("1.0".to_string(), depends, Vec::new()))
            .unwrap();
    }

    #[test]
    fn test_empty_depends_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());
        assert!(validate(&db, "hello", &[]).is_ok());
    }

    #[test]
    fn test_reports_every_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());
        install(&db, "libc", &[]);

        let depends = vec!["zlib".to_string(), "libc".to_string(), "openssl".to_string()];
        match validate(&db, "curl", &depends) {
            Err(Error::MissingDependencies { package, missing }) => {
                assert_eq!(package, "curl");
                assert_eq!(missing, vec!["zlib".to_string(), "openssl".to_string()]);
            }
            other => panic!("expected MissingDependencies, got {:?}", other),
        }
    }

    #[test]
    fn test_reverse_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let db = PackageDb::new(dir.path());
        install(&db, "a", &[]);
        install(&db, "b", &["a"]);
        install(&db, "c", &["b", "a"]);
        install(&db, "d", &["b"]);

        assert_eq!(
            reverse_dependencies(&db, "a").unwrap(),
            vec!["b".to_string(), "c".to_string()]
        );
        assert!(reverse_dependencies(&db, "d").unwrap().is_empty());
    }
}
