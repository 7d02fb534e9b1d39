//! Package management for apm
//!
//! This module provides functionality for:
//! - The binary package format and content addressing
//! - `deps.txt` descriptors and direct dependency sets
//! - The filesystem registry
//! - Dependency resolution, install ordering and installation
//! - Project directory structure and configuration

pub mod archive;
pub mod bundle;
pub mod codec;
pub mod config;
pub mod dependency;
pub mod deps;
pub mod install;
pub mod project;
pub mod registry;
pub mod source;
pub mod tree;

pub use bundle::{pack, unpack, Bundle, Draft, Manifest, Package};
pub use codec::{content_address, decode, encode, Decoded, PackageId};
pub use config::{CheckerConfig, Config};
pub use dependency::{DependencyResolver, Resolution};
pub use deps::{DepsFile, DirectDeps};
pub use install::{InstallEvent, InstallOutcome, Installer, QueueInstaller};
pub use project::Project;
pub use registry::{PackageSource, Registry};
pub use source::{FileKinds, Source};
pub use tree::{topological_order, PackageTree};

use crate::error::ApmResult;
use registry::PACKAGE_EXTENSION;
use std::path::{Path, PathBuf};
use tracing::info;

/// Entry point tying configuration, registry and projects together
#[derive(Debug, Clone)]
pub struct PackageManager {
    config: Config,
    cwd: PathBuf,
}

impl PackageManager {
    /// Create a package manager working from `cwd`
    pub fn new<P: AsRef<Path>>(cwd: P, config: Config) -> Self {
        PackageManager {
            config,
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn file_kinds(&self) -> FileKinds {
        self.config.file_kinds()
    }

    /// Open the configured registry
    pub fn registry(&self) -> ApmResult<Registry> {
        Registry::load(&self.config.registry)
    }

    /// Create a new project in the working directory
    pub fn init_project(&self, name: &str) -> ApmResult<Project> {
        Project::init(&self.cwd, name, &self.file_kinds())
    }

    /// Load the project containing the working directory
    pub fn project(&self) -> ApmResult<Project> {
        Project::find(&self.cwd, &self.file_kinds())
    }

    /// Load a draft directory or a package file
    pub fn inspect(&self, source: &Path) -> ApmResult<Bundle> {
        Bundle::load(&self.cwd.join(source), &self.file_kinds())
    }

    /// Pack the current project's root source into a package file
    ///
    /// A directory destination receives `<name>.apm`.
    pub fn pack_project(&self, destination: &Path) -> ApmResult<(Package, PathBuf)> {
        let draft = self.project()?.draft()?;
        let package = pack(&draft)?;

        let mut dest = self.cwd.join(destination);
        if dest.is_dir() {
            dest = dest.join(format!("{}.{}", package.name(), PACKAGE_EXTENSION));
        }
        package.write_to(&dest)?;
        info!(name = package.name(), id = %package.id().short(), dest = %dest.display(), "packed project");
        Ok((package, dest))
    }

    /// Unpack a package file into a draft directory under the working directory
    pub fn unpack_file(&self, source: &Path) -> ApmResult<Draft> {
        let package = Package::load(&self.cwd.join(source))?;
        unpack(&package, &self.cwd, &self.file_kinds())
    }

    /// Store a draft or package in the registry, creating the registry if needed
    pub fn register(&self, source: &Path, expected: Option<&PackageId>) -> ApmResult<(Package, PathBuf)> {
        let package = match self.inspect(source)? {
            Bundle::Draft(draft) => pack(&draft)?,
            Bundle::Package(package) => package,
        };
        let registry = Registry::create(&self.config.registry)?;
        let path = registry.put(&package, expected)?;
        Ok((package, path))
    }
}
