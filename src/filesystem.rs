// src/filesystem.rs

//! Placing package files into the target root and removing them again
//!
//! Archives carry an arbitrary layout. Each manifest file entry is matched to
//! an extracted file by basename, moved to its declared absolute path under
//! the target root, and optionally exposed through a symlink.

use crate::db::models::TrackedEntry;
use crate::error::{Error, Result};
use crate::packages::{Manifest, extract_to_staging};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A manifest file entry that had no counterpart in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementWarning {
    pub path: String,
}

impl fmt::Display for PlacementWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let basename = Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        write!(f, "no file named '{}' in archive for {}", basename, self.path)
    }
}

/// Result of placing an archive's contents
#[derive(Debug, Default)]
pub struct Materialized {
    /// Placed files and links, in manifest order
    pub entries: Vec<TrackedEntry>,
    /// Manifest entries skipped because the archive lacked them
    pub warnings: Vec<PlacementWarning>,
}

/// Outcome of deleting a package's tracked entries
#[derive(Debug, Default)]
pub struct RemovalSummary {
    pub removed: usize,
    /// `path: reason` for every entry that could not be deleted
    pub failures: Vec<String>,
}

/// Resolve an absolute manifest path beneath `root`
///
/// `..` components are rejected so a manifest can never reach outside the
/// target root. Paths must be absolute and free of control characters and
/// surrounding whitespace, since each one becomes a line of the package
/// record.
pub fn resolve_in_root(root: &Path, path: &str) -> Result<PathBuf> {
    if !path.starts_with('/') || path.trim() != path || path.chars().any(char::is_control) {
        return Err(Error::UnsafePath(path.escape_debug().to_string()));
    }

    let mut resolved = root.to_path_buf();
    let mut has_name = false;

    for component in Path::new(path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => {
                resolved.push(part);
                has_name = true;
            }
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::UnsafePath(path.to_string()));
            }
        }
    }

    if !has_name {
        return Err(Error::UnsafePath(path.to_string()));
    }
    Ok(resolved)
}

/// Regular files named `basename` in the staging tree, best match first
///
/// Candidates are ordered by their staging-relative path so duplicate
/// basenames always resolve the same way.
pub fn candidates(staging: &Path, basename: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(staging)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == OsStr::new(basename))
        .map(|entry| entry.into_path())
        .collect();

    found.sort_by(|a, b| {
        let a = a.strip_prefix(staging).unwrap_or(a);
        let b = b.strip_prefix(staging).unwrap_or(b);
        a.cmp(b)
    });
    found
}

/// First file named `basename` in the staging tree
pub fn locate(staging: &Path, basename: &str) -> Option<PathBuf> {
    candidates(staging, basename).into_iter().next()
}

/// An extracted archive with every manifest entry matched to a staged file
///
/// Nothing under the target root has been touched yet. Dropping a
/// `Placement` without applying it just removes the staging directory.
#[derive(Debug)]
pub struct Placement {
    package: String,
    target_root: PathBuf,
    staging: TempDir,
    planned: Vec<PlannedFile>,
    warnings: Vec<PlacementWarning>,
}

#[derive(Debug)]
struct PlannedFile {
    path: String,
    source: PathBuf,
    dest: PathBuf,
    link: Option<(String, PathBuf)>,
}

/// Extract `archive_path` and match the manifest's files against it
///
/// Entries whose basename is absent from the archive become warnings, or
/// fail with [`Error::PartialPlacement`] when `strict` is set. Unsafe
/// manifest paths fail here as well, before any file is moved.
pub fn prepare(
    manifest: &Manifest,
    archive_path: &Path,
    target_root: &Path,
    staging_parent: &Path,
    strict: bool,
) -> Result<Placement> {
    let staging = extract_to_staging(archive_path, staging_parent)?;

    let mut planned = Vec::new();
    let mut claimed = HashSet::new();
    let mut warnings = Vec::new();

    for entry in &manifest.files {
        let dest = resolve_in_root(target_root, &entry.path)?;
        let link = match entry.link.as_deref() {
            Some(link) => Some((link.to_string(), resolve_in_root(target_root, link)?)),
            None => None,
        };
        let basename = entry
            .basename()
            .ok_or_else(|| Error::UnsafePath(entry.path.clone()))?;

        let source = candidates(staging.path(), basename)
            .into_iter()
            .find(|candidate| !claimed.contains(candidate));

        match source {
            Some(source) => {
                claimed.insert(source.clone());
                planned.push(PlannedFile {
                    path: entry.path.clone(),
                    source,
                    dest,
                    link,
                });
            }
            None => {
                let warning = PlacementWarning {
                    path: entry.path.clone(),
                };
                warn!("{}: {}", manifest.name, warning);
                warnings.push(warning);
            }
        }
    }

    if strict && !warnings.is_empty() {
        return Err(Error::PartialPlacement {
            package: manifest.name.clone(),
            missing: warnings.into_iter().map(|w| w.path).collect(),
        });
    }

    Ok(Placement {
        package: manifest.name.clone(),
        target_root: target_root.to_path_buf(),
        staging,
        planned,
        warnings,
    })
}

impl Placement {
    /// Manifest entries that had no counterpart in the archive
    pub fn warnings(&self) -> &[PlacementWarning] {
        &self.warnings
    }

    /// Move the matched files into the target root and create their links
    ///
    /// Links point at the file's manifest path, which is where it lives once
    /// the target root is the running system's `/`.
    pub fn apply(self) -> Result<Materialized> {
        let mut entries = Vec::new();

        for item in &self.planned {
            place_file(&item.source, &item.dest)?;
            entries.push(TrackedEntry::File(item.path.clone()));

            if let Some((link, link_path)) = &item.link {
                create_link(Path::new(&item.path), link_path)?;
                entries.push(TrackedEntry::Symlink(link.clone()));
            }
        }

        info!(
            "Placed {} entries for {} under {}",
            entries.len(),
            self.package,
            self.target_root.display()
        );
        debug!("Discarding staging tree {}", self.staging.path().display());

        Ok(Materialized {
            entries,
            warnings: self.warnings,
        })
    }
}

/// Extract `archive_path` and place the manifest's files under `target_root`
///
/// The staging directory is removed on every exit path.
pub fn materialize(
    manifest: &Manifest,
    archive_path: &Path,
    target_root: &Path,
    staging_parent: &Path,
    strict: bool,
) -> Result<Materialized> {
    prepare(manifest, archive_path, target_root, staging_parent, strict)?.apply()
}

/// Move a staged file to `dest`, carrying over its executable bits
pub fn place_file(source: &Path, dest: &Path) -> Result<()> {
    let source_mode = fs::metadata(source)
        .map_err(|e| Error::IoError(format!("Failed to stat {}: {}", source.display(), e)))?
        .permissions()
        .mode();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;
    }

    move_file(source, dest)?;

    let exec_bits = source_mode & 0o111;
    if exec_bits != 0 {
        let mut perms = fs::metadata(dest)?.permissions();
        perms.set_mode(perms.mode() | exec_bits);
        fs::set_permissions(dest, perms).map_err(|e| {
            Error::IoError(format!("Failed to mark {} executable: {}", dest.display(), e))
        })?;
    }

    debug!("Placed {} -> {}", source.display(), dest.display());
    Ok(())
}

fn move_file(source: &Path, dest: &Path) -> Result<()> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            // Staging may live on another filesystem than the target root
            if fs::symlink_metadata(dest).is_ok_and(|meta| meta.file_type().is_symlink()) {
                fs::remove_file(dest)?;
            }
            fs::copy(source, dest).map_err(|e| {
                Error::IoError(format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    dest.display(),
                    e
                ))
            })?;
            fs::remove_file(source)?;
            Ok(())
        }
        Err(e) => Err(Error::IoError(format!(
            "Failed to move {} to {}: {}",
            source.display(),
            dest.display(),
            e
        ))),
    }
}

/// Create (or replace) a symlink at `link` pointing at `target`
pub fn create_link(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::IoError(format!("Failed to create directory {}: {}", parent.display(), e))
        })?;
    }

    match fs::symlink_metadata(link) {
        Ok(meta) if meta.is_dir() => {
            return Err(Error::IoError(format!(
                "Refusing to replace directory {} with a symlink",
                link.display()
            )));
        }
        Ok(_) => fs::remove_file(link)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    symlink(target, link).map_err(|e| {
        Error::IoError(format!(
            "Failed to link {} -> {}: {}",
            link.display(),
            target.display(),
            e
        ))
    })?;

    debug!("Linked {} -> {}", link.display(), target.display());
    Ok(())
}

/// Delete tracked entries under `root`, continuing past individual failures
pub fn remove_entries(root: &Path, entries: &[TrackedEntry]) -> RemovalSummary {
    let mut summary = RemovalSummary::default();

    for entry in entries {
        let path = match resolve_in_root(root, entry.path()) {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path(), e);
                summary.failures.push(format!("{}: {}", entry.path(), e));
                continue;
            }
        };

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                summary.removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} already absent", path.display());
                summary.removed += 1;
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                summary.failures.push(format!("{}: {}", entry.path(), e));
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::FileEntry;

    fn write_file(path: &Path, content: &[u8], mode: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn entry(path: &str, link: Option<&str>) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            url: String::new(),
            sha256: String::new(),
            link: link.map(str::to_string),
        }
    }

    fn archive_with(dir: &Path, entries: &[(&str, &[u8], u32)]) -> PathBuf {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        let tar = builder.into_inner().unwrap();
        let path = dir.join("pkg.tar.zst");
        fs::write(&path, zstd::encode_all(&tar[..], 0).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_resolve_in_root() {
        let root = Path::new("/mnt/root");
        assert_eq!(
            resolve_in_root(root, "/usr/bin/hello").unwrap(),
            PathBuf::from("/mnt/root/usr/bin/hello")
        );
        assert_eq!(
            resolve_in_root(root, "/etc/./conf").unwrap(),
            PathBuf::from("/mnt/root/etc/conf")
        );
        assert!(matches!(
            resolve_in_root(root, "/usr/../../etc/shadow"),
            Err(Error::UnsafePath(_))
        ));
        assert!(matches!(resolve_in_root(root, "/"), Err(Error::UnsafePath(_))));
    }

    #[test]
    fn test_resolve_in_root_rejects_record_breaking_paths() {
        let root = Path::new("/mnt/root");
        for path in [
            "/usr/bin/x\n/etc/shadow",
            "/usr/bin/x\r",
            "/usr/bin/\tx",
            "LINK: /etc/shadow",
            "etc/conf",
            "/usr/bin/x ",
        ] {
            assert!(
                matches!(resolve_in_root(root, path), Err(Error::UnsafePath(_))),
                "{:?} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_materialize_rejects_newline_in_link() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let archive = archive_with(dir.path(), &[("tool", b"tool", 0o755)]);
        let manifest = Manifest {
            name: "tool".to_string(),
            version: "1.0".to_string(),
            depends: Vec::new(),
            files: vec![entry("/bin/tool", Some("/usr/bin/tool\n/etc/passwd"))],
            post_install: None,
        };

        let result = materialize(&manifest, &archive, &root, dir.path(), false);
        assert!(matches!(result, Err(Error::UnsafePath(_))));
        assert!(!root.join("bin/tool").exists());
    }

    #[test]
    fn test_locate_duplicate_basenames_is_deterministic() {
        let staging = tempfile::tempdir().unwrap();
        write_file(&staging.path().join("z/tool"), b"z", 0o644);
        write_file(&staging.path().join("a/b/tool"), b"ab", 0o644);
        write_file(&staging.path().join("b/tool"), b"b", 0o644);
        fs::create_dir_all(staging.path().join("tool")).unwrap();

        let found = locate(staging.path(), "tool").unwrap();
        assert_eq!(found, staging.path().join("a/b/tool"));
        assert_eq!(candidates(staging.path(), "tool").len(), 3);
        assert!(locate(staging.path(), "missing").is_none());
    }

    #[test]
    fn test_place_file_keeps_executable_bit() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("staging/hello");
        write_file(&source, b"bin", 0o755);

        let dest = dir.path().join("root/usr/bin/hello");
        place_file(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"bin");
        assert_ne!(fs::metadata(&dest).unwrap().permissions().mode() & 0o111, 0);
    }

    #[test]
    fn test_create_link_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bin/tool");
        write_file(&dest, b"tool", 0o755);
        let link = dir.path().join("usr/bin/tool");
        write_file(&link, b"stale", 0o644);

        create_link(&dest, &link).unwrap();
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), dest);

        create_link(&dest, &link).unwrap();
        assert_eq!(fs::read(&link).unwrap(), b"tool");
    }

    #[test]
    fn test_materialize_places_files_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let archive = archive_with(
            dir.path(),
            &[("pkg/tool", b"tool", 0o755), ("pkg/share/tool.conf", b"conf", 0o644)],
        );
        let manifest = Manifest {
            name: "tool".to_string(),
            version: "1.0".to_string(),
            depends: Vec::new(),
            files: vec![
                entry("/bin/tool", Some("/usr/bin/tool")),
                entry("/etc/tool.conf", None),
                entry("/usr/share/doc/README", None),
            ],
            post_install: None,
        };

        let result = materialize(&manifest, &archive, &root, dir.path(), false).unwrap();
        assert_eq!(
            result.entries,
            vec![
                TrackedEntry::File("/bin/tool".to_string()),
                TrackedEntry::Symlink("/usr/bin/tool".to_string()),
                TrackedEntry::File("/etc/tool.conf".to_string()),
            ]
        );
        assert_eq!(
            result.warnings,
            vec![PlacementWarning {
                path: "/usr/share/doc/README".to_string()
            }]
        );
        assert_eq!(fs::read(root.join("etc/tool.conf")).unwrap(), b"conf");
        assert_eq!(fs::read(root.join("bin/tool")).unwrap(), b"tool");
        // Link targets name the file as the installed system sees it
        assert_eq!(
            fs::read_link(root.join("usr/bin/tool")).unwrap(),
            PathBuf::from("/bin/tool")
        );

        // Only the archive itself and the placed root remain
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().starts_with("flux-staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_materialize_duplicate_entries_claim_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let archive = archive_with(dir.path(), &[("a/lib", b"first", 0o644), ("b/lib", b"second", 0o644)]);
        let manifest = Manifest {
            name: "libs".to_string(),
            version: "1".to_string(),
            depends: Vec::new(),
            files: vec![entry("/usr/lib/one/lib", None), entry("/usr/lib/two/lib", None)],
            post_install: None,
        };

        let result = materialize(&manifest, &archive, &root, dir.path(), false).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert_eq!(fs::read(root.join("usr/lib/one/lib")).unwrap(), b"first");
        assert_eq!(fs::read(root.join("usr/lib/two/lib")).unwrap(), b"second");
    }

    #[test]
    fn test_materialize_strict_fails_before_moving() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let archive = archive_with(dir.path(), &[("tool", b"tool", 0o755)]);
        let manifest = Manifest {
            name: "tool".to_string(),
            version: "1.0".to_string(),
            depends: Vec::new(),
            files: vec![entry("/bin/tool", None), entry("/bin/missing", None)],
            post_install: None,
        };

        let result = materialize(&manifest, &archive, &root, dir.path(), true);
        match result {
            Err(Error::PartialPlacement { package, missing }) => {
                assert_eq!(package, "tool");
                assert_eq!(missing, vec!["/bin/missing".to_string()]);
            }
            other => panic!("expected PartialPlacement, got {:?}", other),
        }
        assert!(!root.join("bin/tool").exists());
    }

    #[test]
    fn test_prepare_leaves_root_untouched_until_applied() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let archive = archive_with(dir.path(), &[("tool", b"tool", 0o755)]);
        let manifest = Manifest {
            name: "tool".to_string(),
            version: "1.0".to_string(),
            depends: Vec::new(),
            files: vec![entry("/bin/tool", None), entry("/bin/absent", None)],
            post_install: None,
        };

        let placement = prepare(&manifest, &archive, &root, dir.path(), false).unwrap();
        assert_eq!(placement.warnings().len(), 1);
        assert!(!root.exists());

        let result = placement.apply().unwrap();
        assert_eq!(result.entries, vec![TrackedEntry::File("/bin/tool".to_string())]);
        assert!(root.join("bin/tool").exists());

        // A prepared placement that is dropped only discards its staging tree
        let archive = archive_with(dir.path(), &[("tool", b"tool2", 0o755)]);
        drop(prepare(&manifest, &archive, &root, dir.path(), false).unwrap());
        assert_eq!(fs::read(root.join("bin/tool")).unwrap(), b"tool");
        let staging_left = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("flux-staging-")
            })
            .count();
        assert_eq!(staging_left, 0);
    }

    #[test]
    fn test_remove_entries_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(&root.join("bin/tool"), b"tool", 0o755);
        symlink(root.join("bin/tool"), root.join("tool-link")).unwrap();
        fs::create_dir_all(root.join("a-directory")).unwrap();

        let entries = vec![
            TrackedEntry::File("/bin/tool".to_string()),
            TrackedEntry::Symlink("/tool-link".to_string()),
            TrackedEntry::File("/a-directory".to_string()),
            TrackedEntry::File("/already/gone".to_string()),
        ];
        let summary = remove_entries(root, &entries);

        assert_eq!(summary.removed, 3);
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].starts_with("/a-directory"));
        assert!(!root.join("bin/tool").exists());
        assert!(fs::symlink_metadata(root.join("tool-link")).is_err());
    }
}
