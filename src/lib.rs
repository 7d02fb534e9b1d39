//! apm: a content-addressed package manager
//!
//! Packages are immutable binaries named by the SHA-256 of their bytes. This
//! crate provides the package codec, a filesystem registry, dependency
//! resolution with ancestor overrides and conflict detection, and the
//! installers that lay resolved packages out as sibling source directories.

pub mod error;
pub mod package;
pub mod tools;
pub mod transport;
pub mod cli;
pub mod logging;

// Re-export core types for convenience
pub use error::*;
