// src/repository/mod.rs

//! Manifest and archive acquisition
//!
//! This module provides functionality for:
//! - Fetching package manifests over HTTP(S) or from local `file://` URLs
//! - Downloading package archives into the cache directory
//! - Verifying archive checksums before anything is extracted
//!
//! Every transfer is attempted exactly once; failures surface immediately.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::packages::Manifest;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, warn};
use url::Url;

/// Where a manifest or archive is read from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Remote(Url),
    Local(PathBuf),
}

/// Classify a location as a remote URL or a local path
fn resolve_source(location: &str) -> std::result::Result<Source, String> {
    match Url::parse(location) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(Source::Remote(url)),
            "file" => url
                .to_file_path()
                .map(Source::Local)
                .map_err(|_| format!("invalid file URL: {}", location)),
            scheme => Err(format!("unsupported URL scheme '{}' in {}", scheme, location)),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Source::Local(PathBuf::from(location))),
        Err(e) => Err(format!("invalid URL {}: {}", location, e)),
    }
}

/// HTTP client wrapper for manifest and archive transfers
pub struct RepositoryClient {
    client: Client,
    cache_dir: PathBuf,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            cache_dir: config.cache_dir.clone(),
        })
    }

    /// Fetch and parse the manifest at `url`
    pub fn fetch_manifest(&self, url: &str) -> Result<Manifest> {
        info!("Fetching manifest from {}", url);

        let body = match resolve_source(url).map_err(Error::FetchError)? {
            Source::Remote(url) => {
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .map_err(|e| Error::FetchError(format!("{}: {}", url, e)))?;

                if !response.status().is_success() {
                    return Err(Error::FetchError(format!(
                        "HTTP {} from {}",
                        response.status(),
                        url
                    )));
                }

                response
                    .text()
                    .map_err(|e| Error::FetchError(format!("Failed to read body of {}: {}", url, e)))?
            }
            Source::Local(path) => fs::read_to_string(&path).map_err(|e| {
                Error::FetchError(format!("Failed to read {}: {}", path.display(), e))
            })?,
        };

        let manifest = Manifest::parse(&body)?;
        debug!(
            "Fetched manifest for {} {} ({} files)",
            manifest.name,
            manifest.version,
            manifest.files.len()
        );
        Ok(manifest)
    }

    /// Download the archive at `url` and verify its SHA-256
    ///
    /// The archive lands in a temporary file inside the cache directory and is
    /// deleted when the returned path is dropped. On checksum mismatch the file
    /// is deleted before the error is returned.
    pub fn fetch_and_verify(&self, url: &str, expected_sha256: &str) -> Result<TempPath> {
        info!("Downloading {}", url);

        let source = resolve_source(url).map_err(Error::DownloadError)?;

        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        let mut temp = tempfile::Builder::new()
            .prefix("flux-download-")
            .suffix(".part")
            .tempfile_in(&self.cache_dir)
            .map_err(|e| Error::IoError(format!("Failed to create download file: {}", e)))?;

        let bytes = self.download_to(&source, temp.as_file_mut())?;
        debug!("Downloaded {} bytes from {}", bytes, url);

        let temp_path = temp.into_temp_path();
        if let Err(e) = verify_checksum(&temp_path, expected_sha256) {
            let leftover = temp_path.to_path_buf();
            if let Err(close_err) = temp_path.close() {
                warn!(
                    "Failed to remove rejected download {}: {}",
                    leftover.display(),
                    close_err
                );
            }
            return Err(e);
        }

        Ok(temp_path)
    }

    fn download_to(&self, source: &Source, file: &mut File) -> Result<u64> {
        let bytes = match source {
            Source::Remote(url) => {
                let mut response = self
                    .client
                    .get(url.clone())
                    .send()
                    .map_err(|e| Error::DownloadError(format!("{}: {}", url, e)))?;

                if !response.status().is_success() {
                    return Err(Error::DownloadError(format!(
                        "HTTP {} from {}",
                        response.status(),
                        url
                    )));
                }

                io::copy(&mut response, file)
                    .map_err(|e| Error::DownloadError(format!("Failed to read {}: {}", url, e)))?
            }
            Source::Local(path) => {
                let mut src = File::open(path).map_err(|e| {
                    Error::DownloadError(format!("Failed to open {}: {}", path.display(), e))
                })?;
                io::copy(&mut src, file).map_err(|e| {
                    Error::DownloadError(format!("Failed to copy {}: {}", path.display(), e))
                })?
            }
        };

        file.flush()
            .map_err(|e| Error::IoError(format!("Failed to write downloaded data: {}", e)))?;
        Ok(bytes)
    }
}

/// Hex-encoded SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open file for checksum: {}", e)))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::IoError(format!("Failed to read file for checksum: {}", e)))?;

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify file checksum matches expected value
fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    debug!("Verifying checksum for {}", path.display());

    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Checksum verified: {}", actual);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(cache_dir: &Path) -> RepositoryClient {
        RepositoryClient::new(&Config::new("/").with_cache_dir(cache_dir)).unwrap()
    }

    fn file_url(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[test]
    fn test_resolve_source() {
        assert!(matches!(
            resolve_source("https://example.com/hello.json"),
            Ok(Source::Remote(_))
        ));
        assert_eq!(
            resolve_source("file:///srv/repo/hello.json"),
            Ok(Source::Local(PathBuf::from("/srv/repo/hello.json")))
        );
        assert_eq!(
            resolve_source("/srv/repo/hello.json"),
            Ok(Source::Local(PathBuf::from("/srv/repo/hello.json")))
        );
        assert!(resolve_source("ftp://example.com/hello.json").is_err());
    }

    #[test]
    fn test_fetch_manifest_from_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.json");
        fs::write(
            &path,
            r#"{"name": "hello", "version": "1.0", "depends": null, "files": []}"#,
        )
        .unwrap();

        let client = client_for(dir.path());
        let manifest = client.fetch_manifest(&file_url(&path)).unwrap();
        assert_eq!(manifest.name, "hello");
        assert_eq!(manifest.version, "1.0");
    }

    #[test]
    fn test_fetch_manifest_errors() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_for(dir.path());

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            client.fetch_manifest(&file_url(&missing)),
            Err(Error::FetchError(_))
        ));

        let nameless = dir.path().join("nameless.json");
        fs::write(&nameless, r#"{"version": "1.0"}"#).unwrap();
        assert!(matches!(
            client.fetch_manifest(&file_url(&nameless)),
            Err(Error::MissingField("name"))
        ));
    }

    #[test]
    fn test_fetch_and_verify_success() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let archive = dir.path().join("pkg.tar.zst");
        fs::write(&archive, b"archive bytes").unwrap();
        let digest = sha256_file(&archive).unwrap();

        let client = client_for(&cache);
        let downloaded = client
            .fetch_and_verify(&file_url(&archive), &digest.to_uppercase())
            .unwrap();
        assert_eq!(fs::read(&downloaded).unwrap(), b"archive bytes");

        let path = downloaded.to_path_buf();
        drop(downloaded);
        assert!(!path.exists());
    }

    #[test]
    fn test_checksum_mismatch_removes_download() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let archive = dir.path().join("pkg.tar.zst");
        fs::write(&archive, b"tampered").unwrap();

        let client = client_for(&cache);
        let result = client.fetch_and_verify(&file_url(&archive), &"0".repeat(64));

        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
        assert_eq!(fs::read_dir(&cache).unwrap().count(), 0);
    }

    #[test]
    fn test_download_error_for_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let client = client_for(&cache);

        let result = client.fetch_and_verify(&file_url(&dir.path().join("nope")), "abc");
        assert!(matches!(result, Err(Error::DownloadError(_))));
        assert_eq!(fs::read_dir(&cache).unwrap().count(), 0);
    }

    #[test]
    fn test_sha256_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
