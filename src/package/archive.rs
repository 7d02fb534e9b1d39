//! Deterministic tar archives for package payloads

use crate::error::{ApmError, ApmResult};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

/// Archive the given files, relative to `root`, into an uncompressed tar
///
/// Entries are written in sorted path order with zeroed ownership and mtime,
/// so the same files always produce the same bytes.
pub fn pack(root: &Path, files: &[String]) -> ApmResult<Vec<u8>> {
    let mut files: Vec<&String> = files.iter().collect();
    files.sort();
    files.dedup();

    let mut builder = Builder::new(Vec::new());
    for rel_path in files {
        let path = root.join(rel_path);
        let metadata = fs::metadata(&path).map_err(|e| ApmError::io(&path, e))?;
        let file = File::open(&path).map_err(|e| ApmError::io(&path, e))?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o644);
        header.set_size(metadata.len());
        builder
            .append_data(&mut header, Path::new(rel_path), file)
            .map_err(|e| ApmError::Archive(format!("failed to add {}: {}", rel_path, e)))?;
    }

    let bytes = builder
        .into_inner()
        .map_err(|e| ApmError::Archive(format!("failed to finish archive: {}", e)))?;
    debug!(root = %root.display(), bytes = bytes.len(), "packed archive");
    Ok(bytes)
}

/// Extract an archive into `dest`, returning the relative paths written
///
/// Entries that would land outside `dest` abort the extraction.
pub fn unpack(payload: &[u8], dest: &Path) -> ApmResult<Vec<PathBuf>> {
    let mut archive = Archive::new(payload);
    archive.set_preserve_mtime(false);

    let entries = archive
        .entries()
        .map_err(|e| ApmError::Archive(format!("unreadable archive: {}", e)))?;

    let mut written = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| ApmError::Archive(format!("unreadable entry: {}", e)))?;
        let rel_path = entry
            .path()
            .map_err(|e| ApmError::Archive(format!("invalid entry path: {}", e)))?
            .into_owned();

        let inside = entry
            .unpack_in(dest)
            .map_err(|e| ApmError::Archive(format!("failed to extract {}: {}", rel_path.display(), e)))?;
        if !inside {
            return Err(ApmError::Archive(format!(
                "entry {} escapes {}",
                rel_path.display(),
                dest.display()
            )));
        }
        written.push(rel_path);
    }

    debug!(dest = %dest.display(), entries = written.len(), "unpacked archive");
    Ok(written)
}
