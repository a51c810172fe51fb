// src/packages/manifest.rs

//! Package manifest model
//!
//! A manifest is the JSON document published next to a package archive. It
//! names the package, its version and dependencies, and lists the files the
//! archive provides together with where they land in the target root.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A parsed package manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub depends: Vec<String>,
    pub files: Vec<FileEntry>,
    /// Absolute path of a placed file run with `sh` once all files are placed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_install: Option<String>,
}

/// A single file declared by a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path of the file inside the target root
    pub path: String,
    /// Download location of the archive carrying this file
    pub url: String,
    /// Hex-encoded SHA-256 of the archive
    pub sha256: String,
    /// Absolute path of a symlink to create pointing at `path`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Wire form of the manifest; required fields are checked after decoding
#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    depends: Option<Vec<String>>,
    #[serde(default)]
    files: Option<Vec<FileEntry>>,
    #[serde(default)]
    post_install: Option<String>,
}

impl Manifest {
    /// Parse a manifest from its JSON text
    ///
    /// `depends` and `files` default to empty when absent or null. Empty or
    /// absent `name`/`version` is reported as [`Error::MissingField`]; a
    /// version spanning several lines is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw: RawManifest =
            serde_json::from_str(raw).map_err(|e| Error::ManifestError(e.to_string()))?;

        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(Error::MissingField("name"))?;
        let version = raw
            .version
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::MissingField("version"))?;

        if version.trim() != version || version.chars().any(char::is_control) {
            return Err(Error::ManifestError(format!(
                "version {:?} must be a single line without surrounding whitespace",
                version
            )));
        }

        Ok(Self {
            name,
            version,
            depends: raw.depends.unwrap_or_default(),
            files: raw.files.unwrap_or_default(),
            post_install: raw.post_install.filter(|p| !p.trim().is_empty()),
        })
    }

    /// The file entry whose `url`/`sha256` locate the package archive
    pub fn archive(&self) -> Option<&FileEntry> {
        self.files.first()
    }
}

impl FileEntry {
    /// Base filename used to find this entry inside an extracted archive
    pub fn basename(&self) -> Option<&str> {
        Path::new(&self.path).file_name().and_then(|n| n.to_str())
    }
}
