//! External tooling run against package sources
//!
//! Type checking is delegated to an external program. [`CommandChecker`]
//! runs it once per primary file with every dependency directory on the
//! include path.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::{ApmError, ApmResult};
use crate::package::config::CheckerConfig;
use crate::package::source::Source;

/// Outcome of checking a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Files that passed
    pub passed: Vec<String>,
    /// Files that failed, with the checker's output
    pub failed: Vec<(String, String)>,
}

impl CheckReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn checked(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    /// Combined output of every failing file
    pub fn failure_output(&self) -> String {
        self.failed
            .iter()
            .map(|(file, output)| format!("{}:\n{}", file, output.trim_end()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Something that can type check a source directory
pub trait TypeChecker {
    fn check(&self, source: &Source, include_dirs: &[PathBuf]) -> ApmResult<CheckReport>;
}

/// Runs an external checker program
#[derive(Debug, Clone)]
pub struct CommandChecker {
    program: String,
    args: Vec<String>,
}

impl CommandChecker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn from_config(config: &CheckerConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn command(&self, source_dir: &Path, include_dirs: &[PathBuf], file: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.arg(format!("-i{}", source_dir.display()));
        for dir in include_dirs {
            cmd.arg(format!("-i{}", dir.display()));
        }
        cmd.arg(file).current_dir(source_dir);
        cmd
    }
}

impl TypeChecker for CommandChecker {
    fn check(&self, source: &Source, include_dirs: &[PathBuf]) -> ApmResult<CheckReport> {
        let mut report = CheckReport::default();

        for file in source.primary_files() {
            debug!(program = %self.program, file = %file, "running checker");
            let output = self
                .command(source.dir(), include_dirs, file)
                .output()
                .map_err(|e| ApmError::Check(format!("failed to run '{}': {}", self.program, e)))?;

            if output.status.success() {
                report.passed.push(file.clone());
            } else {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                report.failed.push((file.clone(), text));
            }
        }
        Ok(report)
    }
}
