// src/db/models.rs

//! Data models for the package database
//!
//! A package record is stored as a small line-oriented text file:
//!
//! ```text
//! version: 1.0
//! depends: ["libc","zlib"]
//! /usr/bin/hello
//! LINK: /bin/hello
//! ```
//!
//! The first line is mandatory, the `depends:` line is optional, and every
//! following line is either a root-relative file path or a `LINK:` entry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::str::FromStr;

const VERSION_PREFIX: &str = "version: ";
const DEPENDS_PREFIX: &str = "depends: ";
const LINK_PREFIX: &str = "LINK: ";

/// A filesystem object placed by a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum TrackedEntry {
    File(String),
    Symlink(String),
}

impl TrackedEntry {
    pub fn path(&self) -> &str {
        match self {
            TrackedEntry::File(path) | TrackedEntry::Symlink(path) => path,
        }
    }
}

/// Installed state of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub version: String,
    pub depends: Option<Vec<String>>,
    pub entries: Vec<TrackedEntry>,
}

impl PackageRecord {
    pub fn new(version: String, depends: Vec<String>, entries: Vec<TrackedEntry>) -> Self {
        let depends = if depends.is_empty() {
            None
        } else {
            Some(depends)
        };

        Self {
            version,
            depends,
            entries,
        }
    }

    /// Declared dependencies, empty when none were recorded
    pub fn depends(&self) -> &[String] {
        self.depends.as_deref().unwrap_or(&[])
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.depends().iter().any(|dep| dep == name)
    }

    /// Render the on-disk text form
    ///
    /// Fails instead of writing a record that would not parse back to the
    /// same entries.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        write!(out, "{}", self).map_err(|_| {
            Error::ParseError(format!(
                "record for version {:?} holds a value that cannot be stored on one line",
                self.version
            ))
        })?;
        Ok(out)
    }
}

/// Whether `value` survives a write/parse cycle as a single record line
fn is_line_safe(value: &str) -> bool {
    !value.is_empty() && value.trim() == value && !value.chars().any(char::is_control)
}

impl FromStr for PackageRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut lines = s.lines().filter(|line| !line.trim().is_empty()).peekable();

        let version = lines
            .next()
            .and_then(|line| line.strip_prefix(VERSION_PREFIX))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::ParseError("missing 'version:' header".to_string()))?;

        let mut depends = None;
        if let Some(raw) = lines.peek().and_then(|line| line.strip_prefix(DEPENDS_PREFIX)) {
            let parsed: Option<Vec<String>> = serde_json::from_str(raw.trim())
                .map_err(|e| Error::ParseError(format!("invalid depends line: {}", e)))?;
            depends = parsed;
            lines.next();
        }

        let entries = lines
            .map(|line| match line.strip_prefix(LINK_PREFIX) {
                Some(link) => TrackedEntry::Symlink(link.trim().to_string()),
                None => TrackedEntry::File(line.trim().to_string()),
            })
            .collect();

        Ok(Self {
            version,
            depends,
            entries,
        })
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !is_line_safe(&self.version) {
            return Err(fmt::Error);
        }
        writeln!(f, "{}{}", VERSION_PREFIX, self.version)?;

        if let Some(depends) = self.depends.as_ref().filter(|d| !d.is_empty()) {
            let json = serde_json::to_string(depends).map_err(|_| fmt::Error)?;
            writeln!(f, "{}{}", DEPENDS_PREFIX, json)?;
        }

        for entry in &self.entries {
            let path = entry.path();
            if !is_line_safe(path) || path.starts_with(LINK_PREFIX) {
                return Err(fmt::Error);
            }
            match entry {
                TrackedEntry::File(path) => writeln!(f, "{}", path)?,
                TrackedEntry::Symlink(path) => writeln!(f, "{}{}", LINK_PREFIX, path)?,
            }
        }

        Ok(())
    }
}
