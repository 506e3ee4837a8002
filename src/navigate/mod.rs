//! Navigate module
//!
//! Working-directory bookkeeping for FTP sessions. Paths are virtual: full
//! canonicalization and permission checks belong to the storage layer, which
//! this server does not include.

mod operations;

pub use operations::{ROOT_PATH, change_directory};
