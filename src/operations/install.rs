// src/operations/install.rs

use super::PackageManager;
use crate::db::models::PackageRecord;
use crate::db::{DbLock, validate_name};
use crate::error::{Error, Result};
use crate::filesystem::{self, Materialized, Placement, PlacementWarning};
use crate::packages::Manifest;
use crate::resolver;
use crate::scripts;
use std::fmt;
use tracing::{debug, info, warn};

/// Result of an install request
#[derive(Debug)]
pub enum InstallOutcome {
    /// A record for the package already existed; nothing was changed
    AlreadyInstalled { name: String, version: String },
    Installed {
        name: String,
        version: String,
        entries: usize,
        warnings: Vec<PlacementWarning>,
    },
}

/// Install pipeline stages, in the order they are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ManifestFetched,
    DependenciesChecked,
    Verified,
    Extracted,
    Placed,
    Recorded,
    Configured,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ManifestFetched => "manifest fetched",
            Stage::DependenciesChecked => "dependencies checked",
            Stage::Verified => "archive downloaded and verified",
            Stage::Extracted => "archive extracted and matched",
            Stage::Placed => "files placed",
            Stage::Recorded => "record written",
            Stage::Configured => "post-install script run",
        };
        f.write_str(name)
    }
}

impl PackageManager {
    /// Install the package described by the manifest at `manifest_url`
    pub fn install(&self, manifest_url: &str) -> Result<InstallOutcome> {
        let _lock = DbLock::acquire(&self.config.db_dir)?;

        let manifest = self.client.fetch_manifest(manifest_url)?;
        debug!("{}: {}", manifest.name, Stage::ManifestFetched);

        self.install_manifest_locked(&manifest)
    }

    /// Install an already fetched manifest; the caller holds the lock
    fn install_manifest_locked(&self, manifest: &Manifest) -> Result<InstallOutcome> {
        let name = &manifest.name;
        validate_name(name)?;

        if self.db.exists(name) {
            let installed = self.db.read(name)?;
            info!("{} {} is already installed", name, installed.version);
            return Ok(InstallOutcome::AlreadyInstalled {
                name: name.clone(),
                version: installed.version,
            });
        }

        resolver::validate(&self.db, name, &manifest.depends)?;
        debug!("{}: {}", name, Stage::DependenciesChecked);

        let placement = self.prepare_locked(manifest)?;
        self.commit_locked(manifest, placement)
    }

    /// Download, verify and extract the manifest's archive
    ///
    /// Nothing under the target root changes, so a failure here leaves the
    /// installed system as it was.
    pub(crate) fn prepare_locked(&self, manifest: &Manifest) -> Result<Placement> {
        let name = &manifest.name;
        let archive_entry = manifest.archive().ok_or_else(|| {
            Error::ManifestError(format!("'{}' declares no files to install", name))
        })?;

        let archive = self
            .client
            .fetch_and_verify(&archive_entry.url, &archive_entry.sha256)?;
        debug!("{}: {}", name, Stage::Verified);

        let placement = filesystem::prepare(
            manifest,
            &archive,
            &self.config.root,
            &self.config.cache_dir,
            self.config.strict,
        );
        if let Err(e) = archive.close() {
            warn!("Failed to remove downloaded archive: {}", e);
        }
        let placement = placement?;
        debug!("{}: {}", name, Stage::Extracted);

        Ok(placement)
    }

    /// Place a prepared archive, record it and run its post-install script
    pub(crate) fn commit_locked(
        &self,
        manifest: &Manifest,
        placement: Placement,
    ) -> Result<InstallOutcome> {
        let name = &manifest.name;
        let Materialized { entries, warnings } = placement.apply()?;
        debug!("{}: {}", name, Stage::Placed);

        let entry_count = entries.len();
        let record = PackageRecord::new(manifest.version.clone(), manifest.depends.clone(), entries);
        self.db.write(name, &record)?;
        debug!("{}: {}", name, Stage::Recorded);

        // Recorded first so a failing script leaves a package `remove` can clean up
        if let Some(script) = &manifest.post_install {
            if self.config.run_scripts {
                scripts::run_post_install(&self.config.root, name, script)?;
                debug!("{}: {}", name, Stage::Configured);
            } else {
                info!("Skipping post-install script of {}", name);
            }
        }

        if warnings.is_empty() {
            info!("Installed {} {}", name, manifest.version);
        } else {
            warn!(
                "Installed {} {} with {} missing file(s)",
                name,
                manifest.version,
                warnings.len()
            );
        }

        Ok(InstallOutcome::Installed {
            name: name.clone(),
            version: manifest.version.clone(),
            entries: entry_count,
            warnings,
        })
    }
}
