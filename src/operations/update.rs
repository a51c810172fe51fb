// src/operations/update.rs

use super::PackageManager;
use super::install::InstallOutcome;
use crate::db::{DbLock, validate_name};
use crate::error::{Error, Result};
use crate::filesystem::PlacementWarning;
use crate::resolver;
use crate::version;
use tracing::info;

/// Result of an update request
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The remote version is not newer than the installed one
    UpToDate { installed: String, available: String },
    Updated {
        from: String,
        to: String,
        warnings: Vec<PlacementWarning>,
    },
}

/// Per-package results of an upgrade, in request order
#[derive(Debug, Default)]
pub struct UpgradeReport {
    pub outcomes: Vec<(String, UpdateOutcome)>,
}

impl UpgradeReport {
    /// Number of packages that were actually replaced
    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, UpdateOutcome::Updated { .. }))
            .count()
    }
}

impl PackageManager {
    /// Replace an installed package when its manifest carries a newer version
    pub fn update(&self, name: &str, manifest_url: &str) -> Result<UpdateOutcome> {
        validate_name(name)?;
        let _lock = DbLock::acquire(&self.config.db_dir)?;
        self.update_locked(name, manifest_url)
    }

    /// Update several packages, each from its own manifest, under one lock
    ///
    /// Stops at the first failure; packages updated before it stay updated.
    pub fn upgrade(&self, targets: &[(String, String)]) -> Result<UpgradeReport> {
        for (name, _) in targets {
            validate_name(name)?;
        }
        let _lock = DbLock::acquire(&self.config.db_dir)?;

        let mut report = UpgradeReport::default();
        for (name, manifest_url) in targets {
            let outcome = self.update_locked(name, manifest_url)?;
            report.outcomes.push((name.clone(), outcome));
        }

        info!(
            "Upgrade finished: {} of {} package(s) updated",
            report.updated(),
            targets.len()
        );
        Ok(report)
    }

    fn update_locked(&self, name: &str, manifest_url: &str) -> Result<UpdateOutcome> {
        let local = self.db.read(name)?;
        let manifest = self.client.fetch_manifest(manifest_url)?;

        if manifest.name != name {
            return Err(Error::ManifestError(format!(
                "manifest at {} describes '{}', not '{}'",
                manifest_url, manifest.name, name
            )));
        }

        if !version::is_newer(&manifest.version, &local.version) {
            info!(
                "{} is up to date (installed {}, available {})",
                name, local.version, manifest.version
            );
            return Ok(UpdateOutcome::UpToDate {
                installed: local.version,
                available: manifest.version,
            });
        }

        info!("Updating {} {} -> {}", name, local.version, manifest.version);

        // Everything that can fail before files change happens up front
        let dependents = resolver::reverse_dependencies(&self.db, name)?;
        if !dependents.is_empty() {
            return Err(Error::DependencyConflict {
                package: name.to_string(),
                dependents,
            });
        }
        resolver::validate(&self.db, name, &manifest.depends)?;
        let placement = self.prepare_locked(&manifest)?;

        self.remove_locked(name)?;
        let warnings = match self.commit_locked(&manifest, placement)? {
            InstallOutcome::Installed { warnings, .. } => warnings,
            InstallOutcome::AlreadyInstalled { .. } => Vec::new(),
        };

        Ok(UpdateOutcome::Updated {
            from: local.version,
            to: manifest.version,
            warnings,
        })
    }
}
