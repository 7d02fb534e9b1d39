//! Direct dependency sets and the `deps.txt` descriptor
//!
//! `deps.txt` lists one dependency per line as `name id`, separated by a
//! single space. Blank lines are ignored. Inside a package the same set is
//! stored as a JSON object `{"name": "id", ...}` whose entries are always
//! emitted in ascending id order.

use crate::error::{AlreadyExistsError, ApmError, ApmResult, NotFoundError, ParseError};
use super::codec::PackageId;
use indexmap::IndexMap;
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Name of the dependency descriptor inside a draft or root source
pub const DEPS_FILE_NAME: &str = "deps.txt";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("package name pattern is valid")
    })
}

/// Check that a package name is usable as a single path segment
pub fn validate_name(name: &str) -> Result<(), ParseError> {
    if name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ParseError::InvalidName(name.to_string()))
    }
}

/// The direct dependencies of a package or project
///
/// Holds at most one id per name and at most one name per id. Iteration is
/// always in ascending id order, which is also the order the resolver visits
/// dependencies and the order they are serialized in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectDeps {
    by_id: BTreeMap<PackageId, String>,
    by_name: BTreeMap<String, PackageId>,
}

impl DirectDeps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency, rejecting a second entry for the same name or id
    pub fn insert(&mut self, name: impl Into<String>, id: PackageId) -> Result<(), ParseError> {
        let name = name.into();
        validate_name(&name)?;
        if let Some(existing) = self.by_name.get(&name) {
            return Err(ParseError::FailedToParseDeps {
                message: format!("multiple versions of '{}' listed ({} and {})", name, existing, id),
            });
        }
        if let Some(other) = self.by_id.get(&id) {
            return Err(ParseError::FailedToParseDeps {
                message: format!("id {} listed for both '{}' and '{}'", id, other, name),
            });
        }
        self.by_id.insert(id.clone(), name.clone());
        self.by_name.insert(name, id);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PackageId> {
        self.by_name.get(name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// `(name, id)` pairs in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageId)> {
        self.by_id.iter().map(|(id, name)| (name.as_str(), id))
    }

    /// Dependency names in ascending id order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(name, _)| name)
    }

    /// Serialize to the JSON object stored inside a package
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the JSON object stored inside a package
    pub fn from_json(raw: &str) -> Result<Self, ParseError> {
        serde_json::from_str(raw).map_err(|e| ParseError::FailedToDeserializeDeps {
            raw: raw.to_string(),
            message: e.to_string(),
        })
    }
}

impl Serialize for DirectDeps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(name, id)| (name, id.as_str())))
    }
}

impl<'de> Deserialize<'de> for DirectDeps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DepsVisitor;

        impl<'de> Visitor<'de> for DepsVisitor {
            type Value = DirectDeps;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping package names to package ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<DirectDeps, A::Error> {
                let mut deps = DirectDeps::new();
                while let Some((name, id)) = map.next_entry::<String, String>()? {
                    let id = PackageId::parse(&id).map_err(de::Error::custom)?;
                    deps.insert(name, id).map_err(de::Error::custom)?;
                }
                Ok(deps)
            }
        }

        deserializer.deserialize_map(DepsVisitor)
    }
}

/// A parsed `deps.txt`, entries kept in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepsFile {
    entries: IndexMap<String, PackageId>,
}

impl DepsFile {
    /// Parse descriptor text
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut entries = IndexMap::new();

        for (index, line) in raw.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let fail = |message: String| ParseError::FailedToParseDeps {
                message: format!("line {}: {}", index + 1, message),
            };

            let tokens: Vec<&str> = line.split(' ').collect();
            let (name, id) = match tokens.as_slice() {
                [name, id] if !name.is_empty() => (*name, *id),
                ["", ..] => return Err(fail(format!("unexpected leading space in {:?}", line))),
                [_] => return Err(fail(format!("expected `name id`, got {:?}", line))),
                _ => return Err(fail(format!("expected exactly two fields, got {:?}", line))),
            };

            validate_name(name).map_err(|e| fail(e.to_string()))?;
            let id = PackageId::parse(id).map_err(|e| fail(e.to_string()))?;
            if entries.contains_key(name) {
                return Err(fail(format!("multiple versions of '{}' listed", name)));
            }
            entries.insert(name.to_string(), id);
        }

        Ok(DepsFile { entries })
    }

    /// Read `deps.txt` from a directory
    pub fn read(dir: &Path) -> ApmResult<Self> {
        let path = dir.join(DEPS_FILE_NAME);
        if !path.is_file() {
            return Err(NotFoundError::DepsFile(dir.to_path_buf()).into());
        }
        let raw = fs::read_to_string(&path).map_err(|e| ApmError::io(&path, e))?;
        Ok(Self::parse(&raw)?)
    }

    /// Write a fresh `deps.txt` into a directory, refusing to overwrite one
    pub fn write(dir: &Path, deps: &DirectDeps) -> ApmResult<()> {
        let path = dir.join(DEPS_FILE_NAME);
        if path.exists() {
            return Err(AlreadyExistsError::Destination(path).into());
        }
        fs::write(&path, Self::render(deps)).map_err(|e| ApmError::io(&path, e))
    }

    /// Render a dependency set as descriptor text, in id order
    pub fn render(deps: &DirectDeps) -> String {
        deps.iter()
            .map(|(name, id)| format!("{} {}\n", name, id))
            .collect()
    }

    pub fn entries(&self) -> &IndexMap<String, PackageId> {
        &self.entries
    }

    pub fn into_entries(self) -> IndexMap<String, PackageId> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to a set, rejecting two names that share an id
    pub fn into_direct_deps(self) -> Result<DirectDeps, ParseError> {
        let mut deps = DirectDeps::new();
        for (name, id) in self.entries {
            deps.insert(name, id)?;
        }
        Ok(deps)
    }
}
