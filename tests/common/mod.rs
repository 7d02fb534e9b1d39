//! Shared fixtures for the integration tests

#![allow(dead_code)]

use apm::error::{ApmResult, NotFoundError};
use apm::package::archive;
use apm::package::{DirectDeps, Package, PackageId, PackageSource};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// In-memory package source that records every fetch
#[derive(Default)]
pub struct MemorySource {
    packages: HashMap<PackageId, Package>,
    fetched: RefCell<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, package: &Package) -> PackageId {
        self.packages.insert(package.id().clone(), package.clone());
        package.id().clone()
    }

    /// Names fetched so far, in order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl PackageSource for MemorySource {
    fn fetch(&self, name: &str, id: &PackageId) -> ApmResult<Package> {
        self.fetched.borrow_mut().push(name.to_string());
        match self.packages.get(id) {
            Some(package) if package.name() == name => Ok(package.clone()),
            _ => Err(NotFoundError::Package {
                name: name.to_string(),
                id: id.to_string(),
                root: "memory".into(),
            }
            .into()),
        }
    }
}

/// Build a dependency set from `(name, id)` pairs
pub fn deps(entries: &[(&str, &PackageId)]) -> DirectDeps {
    let mut deps = DirectDeps::new();
    for (name, id) in entries {
        deps.insert(*name, (*id).clone()).expect("valid dependency");
    }
    deps
}

/// Build a package whose payload is a tar of the given files
pub fn package_with_files(name: &str, dependencies: DirectDeps, files: &[(&str, &str)]) -> Package {
    let payload = archive_files(files);
    Package::create(name, dependencies, &payload).expect("valid package")
}

/// Build a package with a small archive payload derived from its name
pub fn package(name: &str, dependencies: DirectDeps) -> Package {
    let file = format!("{}.agda", capitalize(name));
    let body = format!("module {} where\n", capitalize(name));
    package_with_files(name, dependencies, &[(&file, &body)])
}

/// Build a second, distinct version of a package
pub fn package_v2(name: &str, dependencies: DirectDeps) -> Package {
    let file = format!("{}.agda", capitalize(name));
    let body = format!("module {} where\n-- v2\n", capitalize(name));
    package_with_files(name, dependencies, &[(&file, &body)])
}

pub fn archive_files(files: &[(&str, &str)]) -> Vec<u8> {
    let dir = TempDir::new().expect("Failed to create temp directory");
    write_files(dir.path(), files);
    let names: Vec<String> = files.iter().map(|(name, _)| name.to_string()).collect();
    archive::pack(dir.path(), &names).expect("archive")
}

pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write file");
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
