//! Dependency resolution
//!
//! Resolution walks the dependency graph from a set of direct dependencies
//! and pins exactly one id per name. A name declared by an ancestor shadows
//! the same name further down; two unrelated paths that require different
//! ids for one name are a conflict.
//!
//! Cycles cannot occur: an id is the hash of a package's bytes, which include
//! its dependencies' ids, and every ancestor's name is already an override by
//! the time its descendants are visited.

use crate::error::{ApmResult, ConflictError, ErrorContext};
use super::bundle::Package;
use super::codec::PackageId;
use super::deps::DirectDeps;
use super::registry::PackageSource;
use super::tree::{topological_order, PackageTree};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Result of resolving a project's direct dependencies
#[derive(Debug, Clone)]
pub struct Resolution {
    /// One tree per direct dependency, in id order
    pub trees: Vec<PackageTree>,
    /// The id chosen for every name in the transitive closure
    pub pinned: BTreeMap<String, PackageId>,
}

impl Resolution {
    /// Packages in install order
    pub fn install_order(&self) -> Vec<&Package> {
        topological_order(&self.trees)
    }
}

/// Resolves dependency sets against a package source
pub struct DependencyResolver<'a, S: PackageSource + ?Sized> {
    source: &'a S,
    cache: HashMap<PackageId, Package>,
}

impl<'a, S: PackageSource + ?Sized> DependencyResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        DependencyResolver {
            source,
            cache: HashMap::new(),
        }
    }

    /// Resolve a project's direct dependencies into trees and pins
    pub fn project_tree(&mut self, direct: &DirectDeps) -> ApmResult<Resolution> {
        let mut pinned = BTreeMap::new();
        let trees = self.resolve(direct, &BTreeSet::new(), &mut pinned)?;
        debug!(direct = direct.len(), pinned = pinned.len(), "resolved project tree");
        Ok(Resolution { trees, pinned })
    }

    /// Resolve one level of dependencies and everything beneath it
    ///
    /// `overrides` holds the names already claimed by ancestors. `result`
    /// accumulates pins across the whole walk; a name is inserted only after
    /// its own subtree has resolved.
    pub fn resolve(
        &mut self,
        direct: &DirectDeps,
        overrides: &BTreeSet<String>,
        result: &mut BTreeMap<String, PackageId>,
    ) -> ApmResult<Vec<PackageTree>> {
        let mut remaining = Vec::with_capacity(direct.len());
        for (name, id) in direct.iter() {
            if overrides.contains(name) {
                debug!(name, id = %id.short(), "dependency shadowed by ancestor");
            } else {
                remaining.push((name, id));
            }
        }

        for &(name, id) in &remaining {
            if let Some(existing) = result.get(name) {
                if existing != id {
                    return Err(ConflictError::UnresolvedPeerDependency {
                        name: name.to_string(),
                        existing: existing.to_string(),
                        requested: id.to_string(),
                    }
                    .into());
                }
            }
        }

        let mut local_overrides = overrides.clone();
        local_overrides.extend(remaining.iter().map(|(name, _)| name.to_string()));

        let mut trees = Vec::with_capacity(remaining.len());
        for (name, id) in remaining {
            let package = self.fetch(name, id)?;
            let children = self.resolve(package.deps(), &local_overrides, result)?;
            result.insert(name.to_string(), id.clone());
            trees.push(PackageTree::new(package, children));
        }
        Ok(trees)
    }

    fn fetch(&mut self, name: &str, id: &PackageId) -> ApmResult<Package> {
        if let Some(package) = self.cache.get(id) {
            return Ok(package.clone());
        }
        let package = self
            .source
            .fetch(name, id)
            .with_context(|| format!("failed to fetch {}@{}", name, id.short()))?;
        self.cache.insert(id.clone(), package.clone());
        Ok(package)
    }
}
