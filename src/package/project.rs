//! Project directory structure creation and management
//!
//! A project named `name` lives in a directory `<parent>/<name>/`. Its own
//! sources are in the root source directory `<parent>/<name>/<name>/`, next to
//! a `deps.txt`. Installed dependencies become sibling directories of the
//! root source, one per package name.

use crate::error::{AlreadyExistsError, ApmError, ApmResult, NotFoundError};
use crate::tools::{CheckReport, TypeChecker};
use super::bundle::Draft;
use super::codec::PackageId;
use super::config::CONFIG_FILE_NAME;
use super::dependency::{DependencyResolver, Resolution};
use super::deps::{validate_name, DepsFile, DirectDeps, DEPS_FILE_NAME};
use super::install::{InstallEvent, Installer, QueueInstaller};
use super::registry::PackageSource;
use super::source::{FileKinds, Source};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A loaded project
#[derive(Debug, Clone)]
pub struct Project {
    cwd: PathBuf,
    name: String,
    direct_deps: DirectDeps,
    root_source: Source,
    dependency_sources: Vec<Source>,
    kinds: FileKinds,
}

impl Project {
    /// Create a new, empty project under `parent`
    pub fn init(parent: &Path, name: &str, kinds: &FileKinds) -> ApmResult<Self> {
        validate_name(name)?;
        let cwd = parent.join(name);
        if cwd.exists() {
            return Err(AlreadyExistsError::Project(cwd).into());
        }

        let root_dir = cwd.join(name);
        fs::create_dir_all(&root_dir).map_err(|e| ApmError::io(&root_dir, e))?;
        DepsFile::write(&root_dir, &DirectDeps::new())?;
        info!(name, dir = %cwd.display(), "initialized project");

        Self::load(&cwd, kinds)
    }

    /// Load the project rooted at `cwd`
    pub fn load(cwd: &Path, kinds: &FileKinds) -> ApmResult<Self> {
        if !Self::is_project(cwd) {
            return Err(NotFoundError::Project(cwd.to_path_buf()).into());
        }
        let name = dir_name(cwd)
            .ok_or_else(|| NotFoundError::Project(cwd.to_path_buf()))?
            .to_string();

        let root_dir = cwd.join(&name);
        let direct_deps = DepsFile::read(&root_dir)?.into_direct_deps()?;
        let root_source = Source::load_with(&root_dir, kinds)?;
        let dependency_sources = scan_dependency_sources(cwd, &name, kinds)?;
        debug!(
            name = %name,
            deps = direct_deps.len(),
            installed = dependency_sources.len(),
            "loaded project"
        );

        Ok(Project {
            cwd: cwd.to_path_buf(),
            name,
            direct_deps,
            root_source,
            dependency_sources,
            kinds: kinds.clone(),
        })
    }

    /// Load the project containing `start`
    pub fn find(start: &Path, kinds: &FileKinds) -> ApmResult<Self> {
        match Self::find_project_root(start) {
            Some(root) => Self::load(&root, kinds),
            None => Err(NotFoundError::Project(start.to_path_buf()).into()),
        }
    }

    /// Check if a directory is a project root
    pub fn is_project<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        dir_name(path)
            .map(|name| path.join(name).join(DEPS_FILE_NAME).is_file())
            .unwrap_or(false)
    }

    /// Find the project root by searching up the directory tree
    pub fn find_project_root<P: AsRef<Path>>(start_path: P) -> Option<PathBuf> {
        let mut current = start_path.as_ref().to_path_buf();

        loop {
            if Self::is_project(&current) {
                return Some(current);
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        None
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direct_deps(&self) -> &DirectDeps {
        &self.direct_deps
    }

    pub fn root_source(&self) -> &Source {
        &self.root_source
    }

    pub fn dependency_sources(&self) -> &[Source] {
        &self.dependency_sources
    }

    /// The root source directory
    pub fn root_dir(&self) -> PathBuf {
        self.cwd.join(&self.name)
    }

    /// The root source as a draft
    pub fn draft(&self) -> ApmResult<Draft> {
        Draft::load_with(&self.root_dir(), &self.kinds)
    }

    /// Resolve the project's dependency trees
    pub fn tree<S: PackageSource + ?Sized>(&self, source: &S) -> ApmResult<Resolution> {
        DependencyResolver::new(source).project_tree(&self.direct_deps)
    }

    /// Resolve and install all dependencies
    pub fn install<S: PackageSource + ?Sized>(&mut self, source: &S) -> ApmResult<Resolution> {
        self.install_with(source, |_| {})
    }

    /// Resolve and install all dependencies, reporting each package
    pub fn install_with<S, F>(&mut self, source: &S, on_event: F) -> ApmResult<Resolution>
    where
        S: PackageSource + ?Sized,
        F: FnMut(&InstallEvent),
    {
        let resolution = self.tree(source)?;
        self.install_resolution(&resolution, on_event)?;
        Ok(resolution)
    }

    /// Install an already computed resolution, returning the sources created
    pub fn install_resolution<F>(&mut self, resolution: &Resolution, on_event: F) -> ApmResult<Vec<Source>>
    where
        F: FnMut(&InstallEvent),
    {
        let created = Installer::new(&self.cwd)
            .with_file_kinds(self.kinds.clone())
            .install_with(&resolution.install_order(), on_event)?;
        info!(name = %self.name, installed = created.len(), "installed dependencies");

        self.refresh()?;
        Ok(created)
    }

    /// Install with the recursive queue walk
    pub fn install_legacy<S: PackageSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> ApmResult<IndexMap<String, PackageId>> {
        let installed = QueueInstaller::new(source)
            .with_file_kinds(self.kinds.clone())
            .install_root(&self.root_dir())?;
        self.refresh()?;
        Ok(installed)
    }

    /// Remove everything in the project directory except the root source and
    /// the project configuration
    pub fn clean(&mut self) -> ApmResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for entry in fs::read_dir(&self.cwd).map_err(|e| ApmError::io(&self.cwd, e))? {
            let entry = entry.map_err(|e| ApmError::io(&self.cwd, e))?;
            let file_name = entry.file_name();
            if file_name == self.name.as_str() || file_name == CONFIG_FILE_NAME {
                continue;
            }

            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| ApmError::io(&path, e))?;
            let result = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|e| ApmError::io(&path, e))?;
            removed.push(path);
        }
        removed.sort();
        info!(name = %self.name, removed = removed.len(), "cleaned project");

        self.refresh()?;
        Ok(removed)
    }

    /// Type check the root source against the installed dependencies
    pub fn check(&self, checker: &dyn TypeChecker) -> ApmResult<CheckReport> {
        let include_dirs: Vec<PathBuf> = self
            .dependency_sources
            .iter()
            .map(|source| source.dir().to_path_buf())
            .collect();

        let report = checker.check(&self.root_source, &include_dirs)?;
        if !report.success() {
            return Err(ApmError::Check(format!(
                "{} of {} files failed in {}\n{}",
                report.failed.len(),
                report.checked(),
                self.cwd.display(),
                report.failure_output()
            )));
        }
        Ok(report)
    }

    /// Rescan the root source and the installed dependency directories
    pub fn refresh(&mut self) -> ApmResult<()> {
        let root_dir = self.root_dir();
        self.direct_deps = DepsFile::read(&root_dir)?.into_direct_deps()?;
        self.root_source = Source::load_with(&root_dir, &self.kinds)?;
        self.dependency_sources = scan_dependency_sources(&self.cwd, &self.name, &self.kinds)?;
        Ok(())
    }
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Every visible directory beside the root source, sorted by name
fn scan_dependency_sources(cwd: &Path, name: &str, kinds: &FileKinds) -> ApmResult<Vec<Source>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(cwd).map_err(|e| ApmError::io(cwd, e))? {
        let path = entry.map_err(|e| ApmError::io(cwd, e))?.path();
        let hidden = dir_name(&path).map_or(true, |dir| dir.starts_with('.'));
        if path.is_dir() && !hidden && dir_name(&path) != Some(name) {
            dirs.push(path);
        }
    }
    dirs.sort();
    dirs.iter().map(|dir| Source::load_with(dir, kinds)).collect()
}
