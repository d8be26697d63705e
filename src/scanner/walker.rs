//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] yields every regular file reachable from a root directory.
//!
//! - Symbolic links are never followed and never yielded, so link cycles
//!   cannot occur.
//! - A directory that cannot be listed (permissions, concurrent deletion)
//!   is skipped. The failure comes back as a [`ScanError`] item; the walk
//!   itself keeps going.
//! - Children are sorted by file name, which makes the sequence stable on a
//!   given filesystem. Nothing downstream relies on that order.
//!
//! # Example
//!
//! ```no_run
//! use dupesweep::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let enumeration = walker.collect_files();
//! println!(
//!     "{} files, {} unreadable entries",
//!     enumeration.files.len(),
//!     enumeration.errors.len()
//! );
//! ```

use std::io;
use std::path::{Path, PathBuf};

use jwalk::{Parallelism, WalkDir};

use super::{ScanError, WalkerConfig};

/// Directory walker for parallel file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
}

/// Everything one walk produced.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Regular files, in walk order
    pub files: Vec<PathBuf>,
    /// Entries or subtrees that could not be read
    pub errors: Vec<ScanError>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
        }
    }

    /// Root this walker starts from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn parallelism(&self) -> Parallelism {
        match self.config.threads {
            Some(1) => Parallelism::Serial,
            Some(n) => Parallelism::RayonNewPool(n),
            None => Parallelism::RayonNewPool(0),
        }
    }

    /// Walk the directory tree, yielding regular file paths.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(self.config.skip_hidden)
            .parallelism(self.parallelism())
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_file() {
                        Some(Ok(entry.path()))
                    } else {
                        if file_type.is_symlink() {
                            log::trace!("Skipping symlink: {}", entry.path().display());
                        }
                        None
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    Some(Err(Self::convert_error(path, &e)))
                }
            })
    }

    /// Walk the whole tree and split files from errors.
    #[must_use]
    pub fn collect_files(&self) -> Enumeration {
        let mut enumeration = Enumeration::default();
        for item in self.walk() {
            match item {
                Ok(path) => enumeration.files.push(path),
                Err(e) => enumeration.errors.push(e),
            }
        }
        log::debug!(
            "Enumerated {} files under {} ({} skipped entries)",
            enumeration.files.len(),
            self.root.display(),
            enumeration.errors.len()
        );
        enumeration
    }

    /// Convert a jwalk error, keeping the I/O error kind for classification.
    fn convert_error(path: PathBuf, error: &jwalk::Error) -> ScanError {
        log::warn!("Skipping unreadable entry {}: {}", path.display(), error);
        let kind = error.io_error().map_or(io::ErrorKind::Other, io::Error::kind);
        ScanError::from_io(&path, io::Error::new(kind, error.to_string()))
    }
}
