//! Registry response shapes and the handler behind `GET /package/:name/:version`
//!
//! A package travels as JSON `{ "name", "version", "b64" }` where `b64` is
//! the base64 encoding of its binary form. Failures travel as
//! `{ "status", "message" }`. No HTTP server is bundled; this module only
//! builds and consumes the bodies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApmError, ApmResult, ParseError};
use crate::package::bundle::Package;
use crate::package::codec::PackageId;
use crate::package::registry::{PackageSource, Registry};

/// Successful package response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageResponse {
    pub name: String,
    pub version: String,
    pub b64: String,
}

/// Error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

impl PackageResponse {
    pub fn from_package(package: &Package) -> Self {
        PackageResponse {
            name: package.name().to_string(),
            version: package.id().to_string(),
            b64: STANDARD.encode(package.binary()),
        }
    }

    /// Decode the package and check that it hashes to the advertised version
    pub fn into_package(self) -> ApmResult<Package> {
        let expected = PackageId::parse(&self.version)?;
        let binary = STANDARD
            .decode(self.b64.as_bytes())
            .map_err(|e| ParseError::InvalidResponse(format!("bad base64 payload: {}", e)))?;

        let package = Package::from_bytes(binary)?;
        if package.id() != &expected {
            return Err(ApmError::VersionMismatch {
                expected: expected.to_string(),
                actual: package.id().to_string(),
            });
        }
        if package.name() != self.name {
            return Err(ParseError::InvalidResponse(format!(
                "response names '{}' but package is '{}'",
                self.name,
                package.name()
            ))
            .into());
        }
        Ok(package)
    }
}

impl From<&ApmError> for ErrorResponse {
    fn from(error: &ApmError) -> Self {
        ErrorResponse {
            status: error.status(),
            message: error.to_string(),
        }
    }
}

impl From<ErrorResponse> for ApmError {
    fn from(response: ErrorResponse) -> Self {
        ApmError::Remote {
            status: response.status,
            message: response.message,
        }
    }
}

/// Look up a package for a registry request
pub fn serve_package(registry: &Registry, name: &str, version: &str) -> Result<PackageResponse, ErrorResponse> {
    debug!(name, version, "serving package");
    let fetch = || -> ApmResult<PackageResponse> {
        let id = PackageId::parse(version)?;
        let package = registry.get(name, &id)?;
        Ok(PackageResponse::from_package(&package))
    };
    fetch().map_err(|e| ErrorResponse::from(&e))
}

/// A package source backed by a response-producing fetcher
///
/// The fetcher receives `(name, version)` and returns the response body an
/// HTTP client would have decoded.
pub struct RemoteSource<F> {
    fetcher: F,
}

impl<F> RemoteSource<F>
where
    F: Fn(&str, &str) -> Result<PackageResponse, ErrorResponse>,
{
    pub fn new(fetcher: F) -> Self {
        RemoteSource { fetcher }
    }
}

impl<F> PackageSource for RemoteSource<F>
where
    F: Fn(&str, &str) -> Result<PackageResponse, ErrorResponse>,
{
    fn fetch(&self, name: &str, id: &PackageId) -> ApmResult<Package> {
        let response = (self.fetcher)(name, id.as_str())?;
        let package = response.into_package()?;
        if package.id() != id {
            return Err(ApmError::VersionMismatch {
                expected: id.to_string(),
                actual: package.id().to_string(),
            });
        }
        Ok(package)
    }
}
