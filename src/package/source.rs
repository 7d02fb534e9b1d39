//! Source directories and file classification

use crate::error::{ApmError, ApmResult, NotFoundError};
use super::archive;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// File extensions that decide how a source file is classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKinds {
    /// Extension of the files the type checker consumes
    pub primary: String,
    /// Extension of documentation files shipped alongside them
    pub doc: String,
}

impl Default for FileKinds {
    fn default() -> Self {
        FileKinds {
            primary: "agda".to_string(),
            doc: "md".to_string(),
        }
    }
}

impl FileKinds {
    pub fn new(primary: impl Into<String>, doc: impl Into<String>) -> Self {
        FileKinds {
            primary: primary.into(),
            doc: doc.into(),
        }
    }
}

/// A directory of source files, partitioned by kind
///
/// Paths are relative to `dir`, `/`-separated and sorted. Hidden files and
/// directories are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    dir: PathBuf,
    primary_files: Vec<String>,
    doc_files: Vec<String>,
    misc_files: Vec<String>,
}

impl Source {
    /// Scan a directory with the default file kinds
    pub fn load(dir: &Path) -> ApmResult<Self> {
        Self::load_with(dir, &FileKinds::default())
    }

    /// Scan a directory and classify every regular file beneath it
    pub fn load_with(dir: &Path, kinds: &FileKinds) -> ApmResult<Self> {
        if !dir.is_dir() {
            return Err(NotFoundError::Source(dir.to_path_buf()).into());
        }

        let mut source = Source {
            dir: dir.to_path_buf(),
            primary_files: Vec::new(),
            doc_files: Vec::new(),
            misc_files: Vec::new(),
        };

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                ApmError::io(&path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = relative_path(dir, entry.path());
            match entry.path().extension().and_then(|ext| ext.to_str()) {
                Some(ext) if ext == kinds.primary => source.primary_files.push(rel_path),
                Some(ext) if ext == kinds.doc => source.doc_files.push(rel_path),
                _ => source.misc_files.push(rel_path),
            }
        }

        source.primary_files.sort();
        source.doc_files.sort();
        source.misc_files.sort();

        debug!(
            dir = %dir.display(),
            primary = source.primary_files.len(),
            docs = source.doc_files.len(),
            misc = source.misc_files.len(),
            "loaded source"
        );
        Ok(source)
    }

    /// Extract an archive into an existing directory and scan the result
    pub fn create(dir: &Path, payload: &[u8], kinds: &FileKinds) -> ApmResult<Self> {
        if !dir.is_dir() {
            return Err(ApmError::InvalidDestination {
                path: dir.to_path_buf(),
                reason: "not an existing directory".to_string(),
            });
        }
        archive::unpack(payload, dir)?;
        Self::load_with(dir, kinds)
    }

    /// Archive the primary and documentation files
    pub fn archive(&self) -> ApmResult<Vec<u8>> {
        let files: Vec<String> = self
            .primary_files
            .iter()
            .chain(&self.doc_files)
            .cloned()
            .collect();
        archive::pack(&self.dir, &files)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final component of the directory path
    pub fn name(&self) -> Option<&str> {
        self.dir.file_name().and_then(|name| name.to_str())
    }

    pub fn primary_files(&self) -> &[String] {
        &self.primary_files
    }

    pub fn doc_files(&self) -> &[String] {
        &self.doc_files
    }

    pub fn misc_files(&self) -> &[String] {
        &self.misc_files
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
