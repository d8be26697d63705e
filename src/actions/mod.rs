//! File actions module.
//!
//! Currently one action exists: permanent removal of the redundant members
//! of each duplicate set, keeping the representative.
//!
//! ```no_run
//! use dupesweep::actions::permanent_delete;
//! use std::path::Path;
//!
//! let result = permanent_delete(Path::new("/path/to/duplicate.txt"));
//! ```

pub mod delete;

pub use delete::{
    delete_duplicates, permanent_delete, validate_representative, BatchDeleteResult,
    DeleteError, DeleteProgressCallback, DeleteResult,
};
