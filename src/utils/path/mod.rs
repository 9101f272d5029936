//! Path utilities.
//!
//! - [`fs`]: filesystem path normalization and root-relative keys

pub mod fs;

pub use fs::{key_to_path, normalize_path, path_to_key};
