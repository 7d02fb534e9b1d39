//! Binary package codec and content addressing
//!
//! A package is stored as one contiguous byte string:
//!
//! ```text
//! [u32 LE name length][name, UTF-8][u32 LE deps length][deps JSON, UTF-8][payload]
//! ```
//!
//! The payload runs to the end of the buffer. A package's id is the lowercase
//! hex SHA-256 digest of the whole encoding, so identical inputs always map to
//! the same id.

use crate::error::{CodecError, ParseError};
use super::deps::DirectDeps;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Width of each length prefix in bytes
const LENGTH_PREFIX: usize = 4;

/// Lowercase hex SHA-256 digest identifying a package
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(String);

impl PackageId {
    /// Number of hex characters in a valid id
    pub const LEN: usize = 64;

    /// Validate and wrap a textual id
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let valid = raw.len() == Self::LEN
            && raw.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(PackageId(raw.to_string()))
        } else {
            Err(ParseError::InvalidPackageId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for display
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageId::parse(s)
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the content address of an encoded package
pub fn content_address(bytes: &[u8]) -> PackageId {
    PackageId(hex::encode(Sha256::digest(bytes)))
}

/// A decoded package, borrowing its payload from the input buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub name: String,
    pub deps: DirectDeps,
    pub payload: &'a [u8],
    /// Byte offset at which the payload starts
    pub archive_offset: usize,
}

/// Encode a package into its binary form
pub fn encode(name: &str, deps: &DirectDeps, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    let deps_json = deps
        .to_json()
        .map_err(|e| CodecError::InvalidDepsEncoding(e.to_string()))?;

    let name_len = length_prefix("name", name.len())?;
    let deps_len = length_prefix("deps", deps_json.len())?;

    let mut bytes =
        Vec::with_capacity(2 * LENGTH_PREFIX + name.len() + deps_json.len() + payload.len());
    bytes.extend_from_slice(&name_len);
    bytes.extend_from_slice(name.as_bytes());
    bytes.extend_from_slice(&deps_len);
    bytes.extend_from_slice(deps_json.as_bytes());
    bytes.extend_from_slice(payload);
    Ok(bytes)
}

/// Decode a package, checking every declared length against the buffer
pub fn decode(bytes: &[u8]) -> Result<Decoded<'_>, CodecError> {
    let mut reader = Reader::new(bytes);

    let name = reader.read_field("name")?;
    let name = std::str::from_utf8(name).map_err(|_| CodecError::InvalidName)?;

    let deps = reader.read_field("deps")?;
    let deps = std::str::from_utf8(deps)
        .map_err(|e| CodecError::InvalidDepsEncoding(e.to_string()))?;
    let deps = DirectDeps::from_json(deps)
        .map_err(|e| CodecError::InvalidDepsEncoding(e.to_string()))?;

    let archive_offset = reader.offset;
    Ok(Decoded {
        name: name.to_string(),
        deps,
        payload: reader.rest(),
        archive_offset,
    })
}

fn length_prefix(field: &'static str, len: usize) -> Result<[u8; LENGTH_PREFIX], CodecError> {
    u32::try_from(len)
        .map(u32::to_le_bytes)
        .map_err(|_| CodecError::FieldTooLong { field, len })
}

/// Cursor over the encoded buffer
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn read_len(&mut self, field: &'static str) -> Result<usize, CodecError> {
        let end = self.offset + LENGTH_PREFIX;
        let prefix: [u8; LENGTH_PREFIX] = self
            .bytes
            .get(self.offset..end)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(CodecError::TruncatedHeader {
                field,
                offset: self.offset,
                remaining: self.remaining(),
            })?;
        self.offset = end;
        Ok(u32::from_le_bytes(prefix) as usize)
    }

    fn read_field(&mut self, field: &'static str) -> Result<&'a [u8], CodecError> {
        let declared = self.read_len(field)?;
        if declared > self.remaining() {
            return Err(CodecError::TruncatedField {
                field,
                offset: self.offset,
                declared,
                remaining: self.remaining(),
            });
        }
        let start = self.offset;
        self.offset += declared;
        Ok(&self.bytes[start..self.offset])
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.offset..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_PKG0: &str = "c05b1f8a7fbd053ecd8916ac7cc1b77f3e9363fdc17d83fc6091685048e7db1d";

    #[test]
    fn test_content_address_vectors() {
        assert_eq!(
            content_address(&[1, 2, 3, 4]).as_str(),
            "9f64a747e1b97f131fabb6b447296c9b6f0201e79fb3c5356e6c77e89b6a806a"
        );
        assert_eq!(
            content_address(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            content_address(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode("pkg0", &DirectDeps::new(), b"").unwrap();
        assert_eq!(hex::encode(&bytes), "04000000706b6730020000007b7d");
        assert_eq!(content_address(&bytes).as_str(), EMPTY_PKG0);
    }

    #[test]
    fn test_encode_with_dependency() {
        let mut deps = DirectDeps::new();
        deps.insert("pkg0", PackageId::parse(EMPTY_PKG0).unwrap()).unwrap();

        let bytes = encode("pkg1", &deps, &[1, 2, 3, 4]).unwrap();
        assert_eq!(bytes.len(), 91);
        assert_eq!(
            content_address(&bytes).as_str(),
            "b77153132f4f3324a9c3ce98106931de026a9d31fe69cbe2d9176e4b91af3743"
        );

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.name, "pkg1");
        assert_eq!(decoded.deps, deps);
        assert_eq!(decoded.payload, &[1, 2, 3, 4]);
        assert_eq!(decoded.archive_offset, 87);
    }

    #[test]
    fn test_decode_empty_buffer() {
        let err = decode(&[]).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedHeader { field: "name", offset: 0, remaining: 0 }
        );
    }

    #[test]
    fn test_decode_truncated_name() {
        let err = decode(&[10, 0, 0, 0, b'a', b'b']).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedField { field: "name", offset: 4, declared: 10, remaining: 2 }
        );
    }

    #[test]
    fn test_decode_missing_deps_header() {
        let err = decode(&[1, 0, 0, 0, b'a', 2, 0]).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedHeader { field: "deps", offset: 5, .. }));
    }

    #[test]
    fn test_decode_huge_declared_length() {
        let err = decode(&[0xff, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedField { field: "name", .. }));
    }

    #[test]
    fn test_decode_invalid_name() {
        let err = decode(&[2, 0, 0, 0, 0xc3, 0x28, 2, 0, 0, 0, b'{', b'}']).unwrap_err();
        assert_eq!(err, CodecError::InvalidName);
    }

    #[test]
    fn test_decode_invalid_deps() {
        let mut bytes = vec![1, 0, 0, 0, b'a', 3, 0, 0, 0];
        bytes.extend_from_slice(b"[1]");
        assert!(matches!(decode(&bytes), Err(CodecError::InvalidDepsEncoding(_))));

        let mut bytes = vec![1, 0, 0, 0, b'a', 12, 0, 0, 0];
        bytes.extend_from_slice(br#"{"b":"zzzz"}"#);
        assert!(matches!(decode(&bytes), Err(CodecError::InvalidDepsEncoding(_))));
    }

    #[test]
    fn test_package_id_validation() {
        assert!(PackageId::parse(EMPTY_PKG0).is_ok());
        assert!(PackageId::parse(&EMPTY_PKG0.to_uppercase()).is_err());
        assert!(PackageId::parse(&EMPTY_PKG0[1..]).is_err());
        assert!(PackageId::parse("").is_err());
        assert_eq!(PackageId::parse(EMPTY_PKG0).unwrap().short(), "c05b1f8a7fbd");
    }
}
