//! Streaming 128-bit file hasher.
//!
//! # Overview
//!
//! [`Hasher`] reads a file sequentially in fixed-size chunks and folds each
//! chunk into a running digest state, so peak memory is one chunk no matter
//! how large the file is. The digest only depends on the bytes, never on
//! how the read was split.
//!
//! Two algorithms produce the same [`Digest`] width:
//! - [`DigestAlgorithm::Md5`] (default)
//! - [`DigestAlgorithm::Blake3`], extended output truncated to 16 bytes
//!
//! # Example
//!
//! ```no_run
//! use dupesweep::scanner::{digest_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let digest = hasher.hash_file(Path::new("Cargo.toml")).unwrap();
//! println!("{}", digest_to_hex(&digest));
//! ```

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest as _, Md5};
use serde::{Deserialize, Serialize};

use super::HashError;

/// Digest width in bytes (128 bits).
pub const DIGEST_LEN: usize = 16;

/// Default read chunk size (32 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Largest accepted read chunk size (64 MiB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Fixed-size content digest.
pub type Digest = [u8; DIGEST_LEN];

/// Content digest algorithm.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5 (128-bit)
    #[default]
    Md5,
    /// BLAKE3 truncated to 128 bits
    Blake3,
}

impl DigestAlgorithm {
    /// Lowercase name, as accepted on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Blake3 => "blake3",
        }
    }
}

impl std::fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running digest state for one file.
enum DigestState {
    Md5(Md5),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(Md5::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Md5(state) => state.update(chunk),
            Self::Blake3(state) => {
                state.update(chunk);
            }
        }
    }

    fn finalize(self) -> Digest {
        let mut out = [0u8; DIGEST_LEN];
        match self {
            Self::Md5(state) => out.copy_from_slice(&state.finalize()),
            Self::Blake3(state) => state.finalize_xof().fill(&mut out),
        }
        out
    }
}

/// Chunked file hasher.
///
/// Cheap to clone and safe to share between threads; every call to
/// [`Hasher::hash_file`] owns its own buffer and digest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hasher {
    algorithm: DigestAlgorithm,
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// MD5 with 32 KiB chunks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: DigestAlgorithm::Md5,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Select the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the read chunk size in bytes, clamped to `1..=MAX_CHUNK_SIZE`.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Configured chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest the full content of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] when the file cannot be opened or a read
    /// fails part way through.
    pub fn hash_file(&self, path: &Path) -> Result<Digest, HashError> {
        let file = File::open(path).map_err(|e| {
            log::debug!("Failed to open {}: {}", path.display(), e);
            HashError::from_io(path, &e)
        })?;

        let digest = self.hash_reader(file).map_err(|e| {
            log::debug!("Read failed for {}: {}", path.display(), e);
            HashError::from_io(path, &e)
        })?;

        log::trace!("Hashed {} -> {}", path.display(), digest_to_hex(&digest));
        Ok(digest)
    }

    /// Digest everything readable from `reader`.
    ///
    /// # Errors
    ///
    /// Propagates any read error other than `Interrupted`.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut state = DigestState::new(self.algorithm);
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => state.update(&buffer[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(state.finalize())
    }

    /// Digest an in-memory buffer.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> Digest {
        let mut state = DigestState::new(self.algorithm);
        state.update(data);
        state.finalize()
    }
}

/// Lowercase hex encoding of a digest.
#[must_use]
pub fn digest_to_hex(digest: &Digest) -> String {
    let mut out = String::with_capacity(DIGEST_LEN * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse a 32-character hex string back into a digest.
///
/// Returns `None` for wrong length or non-hex characters.
#[must_use]
pub fn hex_to_digest(hex: &str) -> Option<Digest> {
    if hex.len() != DIGEST_LEN * 2 || !hex.is_ascii() {
        return None;
    }
    let mut out = [0u8; DIGEST_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}
