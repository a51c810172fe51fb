// src/error.rs

use thiserror::Error;

/// Core error types for Flux
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O errors with context about the operation that failed
    #[error("I/O error: {0}")]
    IoError(String),

    /// Initialization error (HTTP client, directories)
    #[error("Failed to initialize: {0}")]
    InitError(String),

    /// Manifest could not be parsed or is unusable
    #[error("Invalid manifest: {0}")]
    ManifestError(String),

    /// Manifest lacks `name` or `version`
    #[error("Manifest is missing required field '{0}'")]
    MissingField(&'static str),

    /// Manifest transport failure
    #[error("Failed to fetch manifest: {0}")]
    FetchError(String),

    /// Archive transport failure
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Downloaded archive does not match the declared digest
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Corrupt or unsupported archive
    #[error("Failed to extract archive: {0}")]
    ExtractionError(String),

    /// Declared dependencies are not installed
    #[error("Cannot install '{package}': missing dependencies: {}", .missing.join(", "))]
    MissingDependencies { package: String, missing: Vec<String> },

    /// Installed packages still depend on the removal target
    #[error("Cannot remove '{package}': required by {}", .dependents.join(", "))]
    DependencyConflict {
        package: String,
        dependents: Vec<String>,
    },

    /// Package is not installed
    #[error("Package '{0}' is not installed")]
    NotFound(String),

    /// Manifest files absent from the archive (strict mode only)
    #[error("Files missing from archive of '{package}': {}", .missing.join(", "))]
    PartialPlacement { package: String, missing: Vec<String> },

    /// Package name cannot be used as a database key
    #[error("Invalid package name: '{0}'")]
    InvalidPackageName(String),

    /// Manifest path escapes the target root
    #[error("Unsafe path in manifest: {0}")]
    UnsafePath(String),

    /// Package record on disk is malformed
    #[error("Failed to parse package record: {0}")]
    ParseError(String),

    /// A package's post-install script could not run or exited non-zero
    #[error("Post-install script {script} of '{package}' failed: {message}")]
    ScriptFailed {
        package: String,
        script: String,
        message: String,
    },

    /// Another flux process holds the database lock
    #[error("Package database is locked by another process ({0})")]
    Locked(String),
}

/// Result type alias using Flux's Error type
pub type Result<T> = std::result::Result<T, Error>;
