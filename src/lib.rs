// src/lib.rs

//! Flux Package Manager
//!
//! Installs, removes and updates binary packages described by JSON
//! manifests, tracking every placed file in a flat on-disk database.
//!
//! # Architecture
//!
//! - Manifests: one archive per package, files matched by basename
//! - Integrity: SHA-256 verification before anything is extracted
//! - Database: one text record per package, presence means installed
//! - Dependencies: enforced on install, reverse-checked on removal
//! - Locking: one advisory lock per database guards every mutation

pub mod config;
pub mod db;
mod error;
pub mod filesystem;
pub mod operations;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod scripts;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use operations::{
    InstallOutcome, InstalledPackage, PackageManager, RemoveReport, UpdateOutcome, UpgradeReport,
};
