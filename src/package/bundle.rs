//! Drafts and packages
//!
//! A [`Draft`] is an editable source directory with a `deps.txt`. A
//! [`Package`] is the immutable binary form of the same content, named by
//! its content address. Both expose a [`Manifest`]; [`Bundle`] holds either.

use crate::error::{AlreadyExistsError, ApmError, ApmResult, ErrorContext, NotFoundError};
use super::codec::{self, PackageId};
use super::deps::{validate_name, DepsFile, DirectDeps};
use super::source::{FileKinds, Source};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name and direct dependencies, common to drafts and packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub deps: DirectDeps,
}

/// An immutable, content-addressed package
#[derive(Debug, Clone)]
pub struct Package {
    manifest: Manifest,
    binary: Vec<u8>,
    archive_offset: usize,
    id: PackageId,
    file_path: Option<PathBuf>,
}

impl Package {
    /// Build a package from its parts
    pub fn create(name: &str, deps: DirectDeps, payload: &[u8]) -> ApmResult<Self> {
        validate_name(name)?;
        let binary = codec::encode(name, &deps, payload)?;
        let archive_offset = binary.len() - payload.len();
        let id = codec::content_address(&binary);
        debug!(name, id = %id.short(), bytes = binary.len(), "created package");

        Ok(Package {
            manifest: Manifest {
                name: name.to_string(),
                deps,
            },
            binary,
            archive_offset,
            id,
            file_path: None,
        })
    }

    /// Decode a package from its binary form
    pub fn from_bytes(binary: Vec<u8>) -> ApmResult<Self> {
        let decoded = codec::decode(&binary)?;
        validate_name(&decoded.name)?;
        let manifest = Manifest {
            name: decoded.name,
            deps: decoded.deps,
        };
        let archive_offset = decoded.archive_offset;
        let id = codec::content_address(&binary);

        Ok(Package {
            manifest,
            binary,
            archive_offset,
            id,
            file_path: None,
        })
    }

    /// Read and decode a package file
    pub fn load(path: &Path) -> ApmResult<Self> {
        if !path.is_file() {
            return Err(NotFoundError::PackageFile(path.to_path_buf()).into());
        }
        let binary = fs::read(path).map_err(|e| ApmError::io(path, e))?;
        let mut package = Self::from_bytes(binary)
            .with_context(|| format!("failed to load package {}", path.display()))?;
        package.file_path = Some(path.to_path_buf());
        Ok(package)
    }

    /// Write the binary form to a new file
    pub fn write_to(&self, dest: &Path) -> ApmResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => AlreadyExistsError::Destination(dest.to_path_buf()).into(),
                _ => ApmError::io(dest, e),
            })?;
        file.write_all(&self.binary).map_err(|e| ApmError::io(dest, e))
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn deps(&self) -> &DirectDeps {
        &self.manifest.deps
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    /// The full encoding
    pub fn binary(&self) -> &[u8] {
        &self.binary
    }

    /// The archive section of the encoding
    pub fn payload(&self) -> &[u8] {
        &self.binary[self.archive_offset..]
    }

    pub fn archive_offset(&self) -> usize {
        self.archive_offset
    }

    /// File the package was loaded from, if any
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Package {}

/// An editable source directory whose name is its package name
#[derive(Debug, Clone)]
pub struct Draft {
    manifest: Manifest,
    source: Source,
}

impl Draft {
    /// Load a draft with the default file kinds
    pub fn load(dir: &Path) -> ApmResult<Self> {
        Self::load_with(dir, &FileKinds::default())
    }

    /// Load a draft from a directory containing `deps.txt`
    pub fn load_with(dir: &Path, kinds: &FileKinds) -> ApmResult<Self> {
        if !dir.is_dir() {
            return Err(NotFoundError::Draft(dir.to_path_buf()).into());
        }
        let name = dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| NotFoundError::Draft(dir.to_path_buf()))?;
        validate_name(name)?;

        let deps = DepsFile::read(dir)?.into_direct_deps()?;
        let source = Source::load_with(dir, kinds)?;
        debug!(name, deps = deps.len(), dir = %dir.display(), "loaded draft");

        Ok(Draft {
            manifest: Manifest {
                name: name.to_string(),
                deps,
            },
            source,
        })
    }

    /// Materialize a package at `dest`
    ///
    /// `dest` must be named after the package and must not exist yet. The
    /// payload is extracted and a `deps.txt` is written from the package's
    /// dependency set. If either step fails, `dest` is removed again.
    pub fn create(dest: &Path, package: &Package, kinds: &FileKinds) -> ApmResult<Self> {
        let basename = dest.file_name().and_then(|name| name.to_str());
        if basename != Some(package.name()) {
            return Err(ApmError::InvalidDestination {
                path: dest.to_path_buf(),
                reason: format!("directory must be named '{}'", package.name()),
            });
        }
        if dest.exists() {
            return Err(AlreadyExistsError::Destination(dest.to_path_buf()).into());
        }

        fs::create_dir_all(dest).map_err(|e| ApmError::io(dest, e))?;
        let filled = Source::create(dest, package.payload(), kinds)
            .and_then(|_| DepsFile::write(dest, package.deps()));
        if let Err(e) = filled {
            if let Err(cleanup) = fs::remove_dir_all(dest) {
                warn!(dest = %dest.display(), error = %cleanup, "failed to remove partial draft");
            }
            return Err(e);
        }
        debug!(name = package.name(), id = %package.id().short(), dest = %dest.display(), "created draft");

        Self::load_with(dest, kinds)
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn deps(&self) -> &DirectDeps {
        &self.manifest.deps
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn dir(&self) -> &Path {
        self.source.dir()
    }

    pub fn into_source(self) -> Source {
        self.source
    }
}

/// Either form of a package
#[derive(Debug, Clone)]
pub enum Bundle {
    Draft(Draft),
    Package(Package),
}

impl Bundle {
    /// Load a draft from a directory or a package from a file
    pub fn load(path: &Path, kinds: &FileKinds) -> ApmResult<Self> {
        if path.is_dir() {
            Ok(Bundle::Draft(Draft::load_with(path, kinds)?))
        } else if path.is_file() {
            Ok(Bundle::Package(Package::load(path)?))
        } else {
            Err(NotFoundError::Source(path.to_path_buf()).into())
        }
    }

    pub fn manifest(&self) -> &Manifest {
        match self {
            Bundle::Draft(draft) => draft.manifest(),
            Bundle::Package(package) => package.manifest(),
        }
    }
}

/// Turn a draft into a package
pub fn pack(draft: &Draft) -> ApmResult<Package> {
    let payload = draft.source().archive()?;
    Package::create(draft.name(), draft.deps().clone(), &payload)
}

/// Materialize a package as a draft directory under `parent`
pub fn unpack(package: &Package, parent: &Path, kinds: &FileKinds) -> ApmResult<Draft> {
    Draft::create(&parent.join(package.name()), package, kinds)
}
