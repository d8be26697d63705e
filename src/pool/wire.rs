//! Byte-exact path encoding for the worker protocol.
//!
//! JSON strings must be UTF-8 but file names need not be, so every path on
//! the wire is the base64 of its raw OS bytes: `OsStrExt::as_bytes` on unix,
//! little-endian UTF-16 code units on Windows. A path decodes back to the
//! exact `PathBuf` that was sent, which the collector relies on to match
//! answers to requests.
//!
//! Use as a serde field adapter:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use std::path::PathBuf;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Job {
//!     #[serde(with = "dupesweep::pool::wire")]
//!     path: PathBuf,
//! }
//! ```

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serializer};

/// Errors decoding a wire path.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WireError {
    /// Not valid base64.
    #[error("invalid path encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes do not form a platform path.
    #[error("invalid path bytes: {0}")]
    Bytes(String),
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, WireError> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(windows)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str()
        .encode_wide()
        .flat_map(u16::to_le_bytes)
        .collect()
}

#[cfg(windows)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, WireError> {
    use std::os::windows::ffi::OsStringExt;
    if bytes.len() % 2 != 0 {
        return Err(WireError::Bytes(format!("odd UTF-16 length {}", bytes.len())));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(PathBuf::from(std::ffi::OsString::from_wide(&units)))
}

#[cfg(not(any(unix, windows)))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(any(unix, windows)))]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, WireError> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| WireError::Bytes(e.to_string()))
}

/// Encode `path` for the wire.
#[must_use]
pub fn encode_path(path: &Path) -> String {
    STANDARD.encode(path_bytes(path))
}

/// Decode a path produced by [`encode_path`].
///
/// # Errors
///
/// Returns a [`WireError`] for malformed input.
pub fn decode_path(encoded: &str) -> Result<PathBuf, WireError> {
    path_from_bytes(STANDARD.decode(encoded)?)
}

/// Serde adapter: serialize a path with [`encode_path`].
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode_path(path))
}

/// Serde adapter: deserialize a path with [`decode_path`].
///
/// # Errors
///
/// Fails on malformed encodings.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    decode_path(&encoded).map_err(serde::de::Error::custom)
}
