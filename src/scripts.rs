// src/scripts.rs

//! Package-provided post-install scripts
//!
//! A manifest may name one of its own placed files as a `post_install`
//! script. It runs with `sh` from the target root once every file is in
//! place, with `FLUX_ROOT` and `FLUX_PACKAGE` set in its environment.

use crate::error::{Error, Result};
use crate::filesystem::resolve_in_root;
use duct::cmd;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to a package's post-install script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRun {
    Completed,
    /// The script was not among the placed files
    Missing,
}

/// Run `script` (a manifest path) for `package` inside `root`
pub fn run_post_install(root: &Path, package: &str, script: &str) -> Result<ScriptRun> {
    let script_path = resolve_in_root(root, script)?;

    if !script_path.is_file() {
        warn!(
            "{}: post-install script {} was not installed, skipping",
            package, script
        );
        return Ok(ScriptRun::Missing);
    }

    info!("Running post-install script for {}", package);
    let output = cmd!("sh", &script_path)
        .dir(root)
        .env("FLUX_ROOT", root)
        .env("FLUX_PACKAGE", package)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| Error::ScriptFailed {
            package: package.to_string(),
            script: script.to_string(),
            message: e.to_string(),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        debug!("{} post-install output: {}", package, stdout.trim());
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ScriptFailed {
            package: package.to_string(),
            script: script.to_string(),
            message: match stderr.trim() {
                "" => output.status.to_string(),
                msg => msg.to_string(),
            },
        });
    }

    Ok(ScriptRun::Completed)
}
