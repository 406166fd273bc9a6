//! Storage module for the local filesystem
//!
//! Documents and rendered page images live under a single root directory.

mod fs;

pub use fs::FileSystem;
