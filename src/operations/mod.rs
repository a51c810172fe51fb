// src/operations/mod.rs

//! Package lifecycle operations
//!
//! [`PackageManager`] ties the database, repository client and filesystem
//! placement together. Mutating operations (install, remove, update, upgrade)
//! hold the database lock for their whole duration; queries do not lock.

mod install;
mod remove;
mod update;

pub use install::InstallOutcome;
pub use remove::RemoveReport;
pub use update::{UpdateOutcome, UpgradeReport};

use crate::config::Config;
use crate::db::{PackageDb, validate_name};
use crate::error::Result;
use crate::repository::RepositoryClient;
use crate::resolver;
use serde::Serialize;

/// An installed package as shown by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// Entry point for install, remove, update and queries on one target root
pub struct PackageManager {
    config: Config,
    db: PackageDb,
    client: RepositoryClient,
}

impl PackageManager {
    pub fn new(config: Config) -> Result<Self> {
        let db = PackageDb::new(&config.db_dir);
        let client = RepositoryClient::new(&config)?;

        Ok(Self { config, db, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &PackageDb {
        &self.db
    }

    /// Installed packages with their versions, sorted by name
    pub fn list(&self) -> Result<Vec<InstalledPackage>> {
        self.db
            .list()?
            .into_iter()
            .map(|name| {
                let record = self.db.read(&name)?;
                Ok(InstalledPackage {
                    name,
                    version: record.version,
                })
            })
            .collect()
    }

    /// Dependencies recorded for an installed package
    pub fn depends(&self, name: &str) -> Result<Vec<String>> {
        validate_name(name)?;
        Ok(self.db.read(name)?.depends().to_vec())
    }

    /// Installed packages that depend on `name`
    pub fn rdepends(&self, name: &str) -> Result<Vec<String>> {
        validate_name(name)?;
        resolver::reverse_dependencies(&self.db, name)
    }
}
