// src/packages/mod.rs

//! Package manifests and archives
//!
//! `manifest` models the JSON document describing a package; `archive`
//! unpacks the compressed tarball it points at into a staging directory.

pub mod archive;
pub mod manifest;

pub use archive::extract_to_staging;
pub use manifest::{FileEntry, Manifest};
