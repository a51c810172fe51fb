// src/version.rs

//! Version comparison for updates
//!
//! Versions that parse as semantic versions are ordered by semver
//! precedence. Anything else is ordered as a plain string, so `"10" < "9"`
//! for versions like those. A semantic version always ranks above a
//! non-semantic one, which keeps the ordering total and transitive when a
//! package switches version schemes.

use semver::Version;
use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Key<'a> {
    // Variant order is the ranking between schemes
    Plain(&'a str),
    Semantic(Version),
}

impl<'a> Key<'a> {
    fn of(version: &'a str) -> Self {
        match Version::parse(version) {
            Ok(parsed) => Key::Semantic(parsed),
            Err(_) => Key::Plain(version),
        }
    }
}

/// Order two version strings
pub fn compare(a: &str, b: &str) -> Ordering {
    Key::of(a).cmp(&Key::of(b))
}

/// Whether `remote` should replace `local`
pub fn is_newer(remote: &str, local: &str) -> bool {
    compare(remote, local) == Ordering::Greater
}
