//! Local manifest construction by walking the built client asset tree.

use crate::error::{ChurnError, Result};
use crate::manifest::{self, Manifest};
use std::path::{Component, Path};
use walkdir::{DirEntry, WalkDir};

/// Check that the asset root exists and is a directory.
///
/// An empty directory is fine; only absence is an error.
pub fn ensure_client_dir(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(ChurnError::NoClientDir(root.to_path_buf()))
    }
}

/// Walk `root` and record every regular file with its size.
///
/// Symlinked directories are not descended, so link cycles cannot loop.
/// A symlink to a regular file contributes the target's size; broken links
/// and links to directories are skipped.
pub fn build_local_manifest(root: &Path) -> Result<Manifest> {
    ensure_client_dir(root)?;

    let mut manifest = Manifest::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            ChurnError::ComputeFailed(format!("walking {}: {}", root.display(), e))
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        if let Some(size) = file_size(&entry)? {
            manifest.insert(manifest_path(entry.path(), root), size);
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = manifest.len(),
        bytes = ?manifest.total_bytes(),
        "Built local manifest"
    );

    Ok(manifest)
}

/// Same as [`build_local_manifest`], rendered with the manifest codec.
pub fn build_local_manifest_text(root: &Path) -> Result<String> {
    build_local_manifest(root).map(|m| manifest::serialize(&m))
}

fn file_size(entry: &DirEntry) -> Result<Option<u64>> {
    if entry.path_is_symlink() {
        return match std::fs::metadata(entry.path()) {
            Ok(target) if target.is_file() => Ok(Some(target.len())),
            _ => Ok(None),
        };
    }

    let metadata = entry.metadata().map_err(|e| {
        ChurnError::ComputeFailed(format!("stat {}: {}", entry.path().display(), e))
    })?;

    if metadata.is_file() {
        Ok(Some(metadata.len()))
    } else {
        // sockets, fifos, devices
        Ok(None)
    }
}

/// `root/a/b.js` becomes `./a/b.js` regardless of the platform separator.
fn manifest_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);

    let mut out = String::from(".");
    for component in relative.components() {
        if let Component::Normal(part) = component {
            out.push('/');
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}
