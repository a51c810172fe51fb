// src/config.rs

//! Runtime configuration for Flux
//!
//! Every path the engine touches is derived from the target root unless
//! overridden, so bootstrap installs into an alternate root keep their own
//! database and lock.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database directory relative to the target root
pub const DEFAULT_DB_SUBDIR: &str = "var/lib/flux/packages";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    /// Root under which manifest paths and links are resolved
    pub root: PathBuf,
    /// Directory holding one record file per installed package
    pub db_dir: PathBuf,
    /// Directory for temporary downloads and staging trees
    pub cache_dir: PathBuf,
    /// Network timeout for manifest and archive fetches
    pub timeout: Duration,
    /// Treat manifest files missing from the archive as a hard failure
    pub strict: bool,
    /// Run packages' post-install scripts
    pub run_scripts: bool,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let db_dir = root.join(DEFAULT_DB_SUBDIR);

        Self {
            root,
            db_dir,
            cache_dir: std::env::temp_dir(),
            timeout: DEFAULT_TIMEOUT,
            strict: false,
            run_scripts: true,
        }
    }

    pub fn with_db_dir(mut self, db_dir: impl Into<PathBuf>) -> Self {
        self.db_dir = db_dir.into();
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_run_scripts(mut self, run_scripts: bool) -> Self {
        self.run_scripts = run_scripts;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("/")
    }
}
