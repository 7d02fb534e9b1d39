//! Materializing packages into a project workspace
//!
//! [`Installer`] installs an already-resolved list of packages.
//! [`QueueInstaller`] is the older walk that reads each installed directory's
//! `deps.txt` and installs as it goes, detecting conflicts on the fly.

use crate::error::{ApmError, ApmResult, ConflictError, ErrorContext};
use super::bundle::{Draft, Package};
use super::codec::PackageId;
use super::deps::DepsFile;
use super::registry::PackageSource;
use super::source::{FileKinds, Source};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to one package during an install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    AlreadyPresent,
    /// Present, but its `deps.txt` disagrees with the requested package
    Stale,
}

/// Progress notification emitted once per package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallEvent {
    pub name: String,
    pub id: PackageId,
    pub outcome: InstallOutcome,
}

/// Installs packages in a given order as sibling directories of a workspace
#[derive(Debug, Clone)]
pub struct Installer {
    workspace: PathBuf,
    kinds: FileKinds,
}

impl Installer {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Installer {
            workspace: workspace.into(),
            kinds: FileKinds::default(),
        }
    }

    pub fn with_file_kinds(mut self, kinds: FileKinds) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Install every package, skipping names already present on disk
    pub fn install(&self, packages: &[&Package]) -> ApmResult<Vec<Source>> {
        self.install_with(packages, |_| {})
    }

    /// Install every package, reporting each outcome to `on_event`
    ///
    /// Returns the sources created by this call. A failure stops the install
    /// and leaves directories created by earlier packages in place. An
    /// existing directory is never replaced; [`InstallOutcome::Stale`] flags
    /// one whose `deps.txt` disagrees with the package.
    pub fn install_with<F>(&self, packages: &[&Package], mut on_event: F) -> ApmResult<Vec<Source>>
    where
        F: FnMut(&InstallEvent),
    {
        let mut created = Vec::new();
        for package in packages {
            let dir = self.workspace.join(package.name());
            let outcome = if dir.exists() {
                existing_outcome(&dir, package)
            } else {
                let draft = Draft::create(&dir, package, &self.kinds)
                    .with_context(|| format!("failed to install {}@{}", package.name(), package.id().short()))?;
                info!(name = package.name(), id = %package.id().short(), "installed package");
                created.push(draft.into_source());
                InstallOutcome::Installed
            };

            on_event(&InstallEvent {
                name: package.name().to_string(),
                id: package.id().clone(),
                outcome,
            });
        }
        Ok(created)
    }
}

/// Compare an existing directory's `deps.txt` against the package it stands in for
fn existing_outcome(dir: &Path, package: &Package) -> InstallOutcome {
    let on_disk = DepsFile::read(dir).and_then(|file| file.into_direct_deps().map_err(ApmError::from));
    match on_disk {
        Ok(deps) if &deps != package.deps() => {
            warn!(
                name = package.name(),
                id = %package.id().short(),
                dir = %dir.display(),
                "installed directory does not match the pinned package, keeping it"
            );
            InstallOutcome::Stale
        }
        Ok(_) => {
            debug!(name = package.name(), dir = %dir.display(), "already installed");
            InstallOutcome::AlreadyPresent
        }
        Err(e) => {
            debug!(name = package.name(), dir = %dir.display(), error = %e, "reusing directory without a readable deps.txt");
            InstallOutcome::AlreadyPresent
        }
    }
}

/// Recursive installer driven by each directory's `deps.txt`
///
/// Any name installed earlier in the same walk is a conflict, even with the
/// same id.
pub struct QueueInstaller<'a, S: PackageSource + ?Sized> {
    source: &'a S,
    kinds: FileKinds,
}

impl<'a, S: PackageSource + ?Sized> QueueInstaller<'a, S> {
    pub fn new(source: &'a S) -> Self {
        QueueInstaller {
            source,
            kinds: FileKinds::default(),
        }
    }

    pub fn with_file_kinds(mut self, kinds: FileKinds) -> Self {
        self.kinds = kinds;
        self
    }

    /// Install everything reachable from the root source directory
    pub fn install_root(&self, root: &Path) -> ApmResult<IndexMap<String, PackageId>> {
        let mut installed = IndexMap::new();
        self.install(root, &BTreeSet::new(), &mut installed)?;
        Ok(installed)
    }

    /// Install the dependencies of `dir` next to it, then recurse into each
    ///
    /// `queue` holds names committed by ancestors. `installed` is shared by
    /// the whole walk and records each name with the id chosen for it.
    pub fn install(
        &self,
        dir: &Path,
        queue: &BTreeSet<String>,
        installed: &mut IndexMap<String, PackageId>,
    ) -> ApmResult<()> {
        let workspace = dir.parent().ok_or_else(|| ApmError::InvalidDestination {
            path: dir.to_path_buf(),
            reason: "directory has no parent".to_string(),
        })?;

        let mut temp_queue = IndexMap::new();
        for (name, id) in DepsFile::read(dir)?.into_entries() {
            if queue.contains(&name) {
                debug!(name = %name, id = %id.short(), "overridden by ancestor");
            } else {
                temp_queue.insert(name, id);
            }
        }

        let mut new_queue = queue.clone();
        new_queue.extend(temp_queue.keys().cloned());

        for (name, id) in temp_queue {
            if let Some(existing) = installed.get(&name) {
                return Err(ConflictError::UnresolvedPeerDependency {
                    name,
                    existing: existing.to_string(),
                    requested: id.to_string(),
                }
                .into());
            }
            installed.insert(name.clone(), id.clone());

            let package_dir = workspace.join(&name);
            if package_dir.exists() {
                debug!(name = %name, dir = %package_dir.display(), "reusing installed directory");
            } else {
                let package = self.source.fetch(&name, &id)?;
                Draft::create(&package_dir, &package, &self.kinds)?;
                info!(name = %name, id = %id.short(), "installed package");
            }

            self.install(&package_dir, &new_queue, installed)?;
        }
        Ok(())
    }
}
