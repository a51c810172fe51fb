// src/packages/archive.rs

//! Package archive extraction
//!
//! Packages ship as compressed tarballs (zstd by default). The archive is
//! unpacked into a fresh staging directory; the materializer then picks files
//! out of that tree by basename.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tar::Archive;
use tempfile::TempDir;
use tracing::debug;
use xz2::read::XzDecoder;

/// Archive compression format, detected from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Zstd,
    Gzip,
    Xz,
    /// Uncompressed tar stream
    None,
}

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const USTAR_OFFSET: usize = 257;

/// Detect compression format from the leading bytes of an archive
pub fn detect_compression(header: &[u8]) -> Result<CompressionFormat> {
    if header.starts_with(&ZSTD_MAGIC) {
        return Ok(CompressionFormat::Zstd);
    }
    if header.starts_with(&XZ_MAGIC) {
        return Ok(CompressionFormat::Xz);
    }
    if header.starts_with(&GZIP_MAGIC) {
        return Ok(CompressionFormat::Gzip);
    }
    if header.len() >= USTAR_OFFSET + 5 && &header[USTAR_OFFSET..USTAR_OFFSET + 5] == b"ustar" {
        return Ok(CompressionFormat::None);
    }

    Err(Error::ExtractionError(
        "unrecognized archive format (expected zstd, gzip or xz compressed tar)".to_string(),
    ))
}

/// Open and decompress the package archive
fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(|e| {
        Error::ExtractionError(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut header = Vec::with_capacity(512);
    (&mut file)
        .take(512)
        .read_to_end(&mut header)
        .map_err(|e| Error::ExtractionError(format!("Failed to read archive header: {}", e)))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| Error::ExtractionError(format!("Failed to rewind archive: {}", e)))?;

    let compression = detect_compression(&header)?;
    debug!("Detected {:?} compression for {}", compression, path.display());

    let reader: Box<dyn Read> = match compression {
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(file).map_err(|e| {
                Error::ExtractionError(format!("Failed to create zstd decoder: {}", e))
            })?;
            Box::new(decoder)
        }
        CompressionFormat::Gzip => Box::new(GzDecoder::new(file)),
        CompressionFormat::Xz => Box::new(XzDecoder::new(file)),
        CompressionFormat::None => Box::new(file),
    };

    Ok(Archive::new(reader))
}

/// Unpack `archive_path` into a new staging directory under `staging_parent`
///
/// The returned directory is removed when dropped. On failure the partially
/// populated staging directory is removed before the error is returned.
pub fn extract_to_staging(archive_path: &Path, staging_parent: &Path) -> Result<TempDir> {
    fs::create_dir_all(staging_parent).map_err(|e| {
        Error::IoError(format!(
            "Failed to create staging parent {}: {}",
            staging_parent.display(),
            e
        ))
    })?;

    let staging = tempfile::Builder::new()
        .prefix("flux-staging-")
        .tempdir_in(staging_parent)
        .map_err(|e| Error::IoError(format!("Failed to create staging directory: {}", e)))?;

    let mut archive = open_archive(archive_path)?;
    archive.set_preserve_permissions(true);
    archive
        .unpack(staging.path())
        .map_err(|e| Error::ExtractionError(format!("Failed to unpack archive: {}", e)))?;

    debug!(
        "Extracted {} into {}",
        archive_path.display(),
        staging.path().display()
    );
    Ok(staging)
}
