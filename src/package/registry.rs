//! Filesystem package registry
//!
//! Packages live at `<root>/<name>/<id>.apm`. The registry never overwrites
//! a stored file.

use crate::error::{AlreadyExistsError, ApmError, ApmResult, NotFoundError};
use super::bundle::Package;
use super::codec::PackageId;
use super::deps::validate_name;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of stored package files
pub const PACKAGE_EXTENSION: &str = "apm";

/// Anything that can hand out packages by name and id
pub trait PackageSource {
    fn fetch(&self, name: &str, id: &PackageId) -> ApmResult<Package>;
}

/// A registry rooted at a local directory
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Open an existing registry
    pub fn load(root: impl AsRef<Path>) -> ApmResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(NotFoundError::Registry(root.to_path_buf()).into());
        }
        Ok(Registry {
            root: root.to_path_buf(),
        })
    }

    /// Create the registry directory if needed, then open it
    pub fn create(root: impl AsRef<Path>) -> ApmResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| ApmError::io(root, e))?;
        Self::load(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn package_path(&self, name: &str, id: &PackageId) -> PathBuf {
        self.root
            .join(name)
            .join(format!("{}.{}", id, PACKAGE_EXTENSION))
    }

    pub fn contains(&self, name: &str, id: &PackageId) -> bool {
        validate_name(name).is_ok() && self.package_path(name, id).is_file()
    }

    /// Load a stored package
    ///
    /// The stored bytes must hash to the requested id.
    pub fn get(&self, name: &str, id: &PackageId) -> ApmResult<Package> {
        validate_name(name)?;
        let path = self.package_path(name, id);
        if !path.is_file() {
            return Err(NotFoundError::Package {
                name: name.to_string(),
                id: id.to_string(),
                root: self.root.clone(),
            }
            .into());
        }

        let package = Package::load(&path)?;
        if package.id() != id {
            return Err(ApmError::VersionMismatch {
                expected: id.to_string(),
                actual: package.id().to_string(),
            });
        }
        debug!(name, id = %id.short(), "fetched package from registry");
        Ok(package)
    }

    /// Store a package, optionally checking it against an expected id
    pub fn put(&self, package: &Package, expected: Option<&PackageId>) -> ApmResult<PathBuf> {
        if let Some(expected) = expected {
            if expected != package.id() {
                return Err(ApmError::VersionMismatch {
                    expected: expected.to_string(),
                    actual: package.id().to_string(),
                });
            }
        }

        let path = self.package_path(package.name(), package.id());
        if path.exists() {
            return Err(self.already_exists(package));
        }
        let dir = self.root.join(package.name());
        fs::create_dir_all(&dir).map_err(|e| ApmError::io(&dir, e))?;

        package.write_to(&path).map_err(|e| match e {
            ApmError::AlreadyExists(_) => self.already_exists(package),
            other => other,
        })?;
        info!(name = package.name(), id = %package.id().short(), "registered package");
        Ok(path)
    }

    /// Names with at least one stored package, sorted
    pub fn names(&self) -> ApmResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| ApmError::io(&self.root, e))? {
            let entry = entry.map_err(|e| ApmError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() && !self.versions(name)?.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Stored ids for a name, sorted
    pub fn versions(&self, name: &str) -> ApmResult<Vec<PackageId>> {
        validate_name(name)?;
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| ApmError::io(&dir, e))? {
            let path = entry.map_err(|e| ApmError::io(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PACKAGE_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| PackageId::parse(stem).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn already_exists(&self, package: &Package) -> ApmError {
        AlreadyExistsError::Package {
            name: package.name().to_string(),
            id: package.id().to_string(),
            root: self.root.clone(),
        }
        .into()
    }
}

impl PackageSource for Registry {
    fn fetch(&self, name: &str, id: &PackageId) -> ApmResult<Package> {
        self.get(name, id)
    }
}

impl<S: PackageSource + ?Sized> PackageSource for &S {
    fn fetch(&self, name: &str, id: &PackageId) -> ApmResult<Package> {
        (**self).fetch(name, id)
    }
}
