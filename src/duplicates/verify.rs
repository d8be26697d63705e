//! Optional byte-by-byte confirmation of duplicate sets.
//!
//! A shared 128-bit digest is normally taken as proof of identical content.
//! With verification enabled, every member is compared against the
//! representative of each equivalence class in turn, and a set whose members
//! turn out to differ is split. Members that cannot be read are dropped from
//! their set, which keeps them off the deletion list.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::DuplicateSet;
use crate::scanner::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// A member that could not be compared.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// The file could not be opened or read.
    #[error("Cannot verify {path}: {source}")]
    Unreadable {
        /// File that failed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl VerifyError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Unreadable { path, .. } => path,
        }
    }

    fn unreadable(path: &Path, source: io::Error) -> Self {
        Self::Unreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Fill `buf` as far as the reader allows; returns the byte count.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Compare two files chunk by chunk.
///
/// # Errors
///
/// Returns a [`VerifyError`] naming whichever file failed to open or read.
pub fn files_equal(a: &Path, b: &Path, chunk_size: usize) -> Result<bool, VerifyError> {
    let mut file_a = File::open(a).map_err(|e| VerifyError::unreadable(a, e))?;
    let mut file_b = File::open(b).map_err(|e| VerifyError::unreadable(b, e))?;

    let len_a = file_a.metadata().map_err(|e| VerifyError::unreadable(a, e))?.len();
    let len_b = file_b.metadata().map_err(|e| VerifyError::unreadable(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
    let mut buf_a = vec![0u8; chunk_size];
    let mut buf_b = vec![0u8; chunk_size];

    loop {
        let n_a = read_full(&mut file_a, &mut buf_a).map_err(|e| VerifyError::unreadable(a, e))?;
        let n_b = read_full(&mut file_b, &mut buf_b).map_err(|e| VerifyError::unreadable(b, e))?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Split one set into classes of byte-identical members.
fn split_set(set: &DuplicateSet, chunk_size: usize, errors: &mut Vec<VerifyError>) -> Vec<DuplicateSet> {
    // Each class is a list of paths; its first entry is the comparison anchor.
    let mut classes: Vec<Vec<PathBuf>> = Vec::new();

    'members: for path in &set.paths {
        if let Err(e) = File::open(path) {
            log::warn!("Excluding {} from verification: {}", path.display(), e);
            errors.push(VerifyError::unreadable(path, e));
            continue;
        }

        for class in &mut classes {
            match files_equal(&class[0], path, chunk_size) {
                Ok(true) => {
                    class.push(path.clone());
                    continue 'members;
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("{}", e);
                    errors.push(e);
                    continue 'members;
                }
            }
        }
        classes.push(vec![path.clone()]);
    }

    if classes.len() > 1 {
        log::warn!(
            "Digest {} is shared by {} distinct contents",
            set.digest_hex(),
            classes.len()
        );
    }

    classes
        .into_iter()
        .filter(|class| class.len() > 1)
        .map(|class| DuplicateSet::new(set.digest, class))
        .collect()
}

/// Confirm every set byte-by-byte with the default chunk size.
#[must_use]
pub fn verify_sets(sets: &[DuplicateSet]) -> (Vec<DuplicateSet>, Vec<VerifyError>) {
    verify_sets_with_chunk_size(sets, DEFAULT_CHUNK_SIZE)
}

/// Confirm every set byte-by-byte, reading `chunk_size` bytes at a time.
///
/// Returned sets keep the representative-first ordering of
/// [`group_by_digest`](super::group_by_digest).
#[must_use]
pub fn verify_sets_with_chunk_size(
    sets: &[DuplicateSet],
    chunk_size: usize,
) -> (Vec<DuplicateSet>, Vec<VerifyError>) {
    let mut verified = Vec::with_capacity(sets.len());
    let mut errors = Vec::new();

    for set in sets {
        verified.extend(split_set(set, chunk_size, &mut errors));
    }
    verified.sort_by(|a, b| a.representative().cmp(b.representative()));

    log::info!(
        "Verification complete: {} of {} sets confirmed, {} unreadable members",
        verified.len(),
        sets.len(),
        errors.len()
    );

    (verified, errors)
}
