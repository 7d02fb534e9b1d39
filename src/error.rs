//! Error types for the package manager
//!
//! Every failure in the core belongs to one kind (codec, not-found, conflict,
//! already-exists, parse, version mismatch). Each kind is its own enum so
//! callers can match on it, and `ApmError` ties them together. Context is
//! attached with [`ErrorContext`] and stripped again with [`ApmError::root`].

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for all package manager errors
#[derive(Debug, Error)]
pub enum ApmError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("{0}")]
    Conflict(#[from] ConflictError),

    #[error("{0}")]
    AlreadyExists(#[from] AlreadyExistsError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Invalid destination {}: {reason}", path.display())]
    InvalidDestination { path: PathBuf, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Check failed: {0}")]
    Check(String),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ApmError>,
    },
}

/// Malformed package bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated header: {field} length needs 4 bytes at offset {offset}, {remaining} remaining")]
    TruncatedHeader {
        field: &'static str,
        offset: usize,
        remaining: usize,
    },

    #[error("truncated field: {field} declares {declared} bytes at offset {offset}, {remaining} remaining")]
    TruncatedField {
        field: &'static str,
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    #[error("{field} is too long to encode ({len} bytes)")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("package name is not valid UTF-8")]
    InvalidName,

    #[error("invalid dependency encoding: {0}")]
    InvalidDepsEncoding(String),
}

/// A filesystem entity that should exist but does not
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("Registry not found: {}", .0.display())]
    Registry(PathBuf),

    #[error("Package {name}@{id} not found in {}", root.display())]
    Package {
        name: String,
        id: String,
        root: PathBuf,
    },

    #[error("Package file not found: {}", .0.display())]
    PackageFile(PathBuf),

    #[error("Project not found: {}", .0.display())]
    Project(PathBuf),

    #[error("Draft not found: {}", .0.display())]
    Draft(PathBuf),

    #[error("deps.txt invalid or missing in {}", .0.display())]
    DepsFile(PathBuf),

    #[error("Source not found: {}", .0.display())]
    Source(PathBuf),
}

/// Two reachable dependencies disagree on a name
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("Unresolved peer dependency: {name} (already resolved as {existing}, also required as {requested})")]
    UnresolvedPeerDependency {
        name: String,
        existing: String,
        requested: String,
    },
}

/// A write that would clobber existing data
#[derive(Debug, Error)]
pub enum AlreadyExistsError {
    #[error("Package {name}@{id} already exists in {}", root.display())]
    Package {
        name: String,
        id: String,
        root: PathBuf,
    },

    #[error("Project already exists: {}", .0.display())]
    Project(PathBuf),

    #[error("Destination already exists: {}", .0.display())]
    Destination(PathBuf),
}

/// Malformed textual or JSON input
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse deps.txt: {message}")]
    FailedToParseDeps { message: String },

    #[error("Failed to deserialize dependencies {raw:?}: {message}")]
    FailedToDeserializeDeps { raw: String, message: String },

    #[error("Invalid package id {0:?}: expected 64 lowercase hex characters")]
    InvalidPackageId(String),

    #[error("Invalid package name {0:?}")]
    InvalidName(String),

    #[error("Invalid configuration in {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Invalid registry response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for package manager operations
pub type ApmResult<T> = Result<T, ApmError>;

impl ApmError {
    /// Wrap a std I/O error with the path it happened at
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ApmError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &ApmError {
        let mut current = self;
        while let ApmError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// HTTP-style status code for this error, used by the registry endpoint
    pub fn status(&self) -> u16 {
        match self.root() {
            ApmError::NotFound(_) => 404,
            ApmError::AlreadyExists(_) | ApmError::Conflict(_) => 409,
            ApmError::Codec(_) | ApmError::Parse(_) | ApmError::InvalidDestination { .. } => 400,
            ApmError::VersionMismatch { .. } => 422,
            ApmError::Remote { status, .. } => *status,
            ApmError::Archive(_) | ApmError::Check(_) | ApmError::Io { .. } => 500,
            ApmError::Context { .. } => 500,
        }
    }
}

/// Attach context to a failing result without changing its kind
pub trait ErrorContext<T> {
    fn context(self, context: impl Into<String>) -> ApmResult<T>;

    fn with_context<F>(self, f: F) -> ApmResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<ApmError>,
{
    fn context(self, context: impl Into<String>) -> ApmResult<T> {
        self.map_err(|e| ApmError::Context {
            context: context.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<F>(self, f: F) -> ApmResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ApmError::Context {
            context: f(),
            source: Box::new(e.into()),
        })
    }
}
