//! Configuration loading for `apm.toml` files
//!
//! Settings are layered: built-in defaults, then `~/.apm/config.toml`, then
//! the project's `apm.toml`, then the `APM_REGISTRY` environment variable.
//! Each file only needs to name the keys it changes.

use crate::error::{ApmError, ApmResult, ParseError};
use super::source::FileKinds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the project-level configuration file
pub const CONFIG_FILE_NAME: &str = "apm.toml";

/// Environment variable overriding the registry location
pub const REGISTRY_ENV: &str = "APM_REGISTRY";

/// Package manager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root directory of the local registry
    pub registry: PathBuf,
    pub primary_extension: String,
    pub doc_extension: String,
    pub checker: CheckerConfig,
}

/// External type checker invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckerConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: apm_home().join("registry"),
            primary_extension: "agda".to_string(),
            doc_extension: "md".to_string(),
            checker: CheckerConfig::default(),
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            program: "agda".to_string(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a complete configuration from TOML
    pub fn from_toml(content: &str) -> Result<Self, ParseError> {
        toml::from_str(content).map_err(|e| ParseError::InvalidConfig {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })
    }

    /// Load a single configuration file over the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> ApmResult<Self> {
        let mut config = Config::default();
        config.merge_file(path.as_ref())?;
        Ok(config)
    }

    /// Resolve the effective configuration for a project directory
    pub fn load(project_dir: Option<&Path>) -> ApmResult<Self> {
        let mut config = Config::default();

        let user_config = apm_home().join("config.toml");
        if user_config.is_file() {
            config.merge_file(&user_config)?;
        }
        if let Some(dir) = project_dir {
            let project_config = dir.join(CONFIG_FILE_NAME);
            if project_config.is_file() {
                config.merge_file(&project_config)?;
            }
        }
        if let Some(registry) = std::env::var_os(REGISTRY_ENV) {
            config.registry = PathBuf::from(registry);
        }

        debug!(registry = %config.registry.display(), "resolved configuration");
        Ok(config)
    }

    /// Overlay the keys present in a TOML file onto this configuration
    pub fn merge_file(&mut self, path: &Path) -> ApmResult<()> {
        let content = fs::read_to_string(path).map_err(|e| ApmError::io(path, e))?;
        let invalid = |message: String| ParseError::InvalidConfig {
            path: path.to_path_buf(),
            message,
        };

        let overlay: toml::Table = content.parse().map_err(|e: toml::de::Error| invalid(e.to_string()))?;
        let mut base = match toml::Value::try_from(&*self) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err(invalid("configuration is not a table".to_string()).into()),
            Err(e) => return Err(invalid(e.to_string()).into()),
        };
        merge_tables(&mut base, overlay);

        *self = toml::Value::Table(base)
            .try_into()
            .map_err(|e: toml::de::Error| invalid(e.to_string()))?;
        Ok(())
    }

    /// Write the configuration to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> ApmResult<()> {
        let path = path.as_ref();
        let content = self.to_toml().map_err(|message| ParseError::InvalidConfig {
            path: path.to_path_buf(),
            message,
        })?;
        fs::write(path, content).map_err(|e| ApmError::io(path, e))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn file_kinds(&self) -> FileKinds {
        FileKinds::new(&self.primary_extension, &self.doc_extension)
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, nested),
                _ => {
                    base.insert(key, toml::Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// `~/.apm`, falling back to a relative `.apm` when no home is known
pub fn apm_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apm")
}
