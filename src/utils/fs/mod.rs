//! File system utilities
//!
//! - [`atomic`] - temp-and-rename writes used for every persisted document
//! - [`dirs`] - directory creation and removal

pub mod atomic;
pub mod dirs;

pub use atomic::{atomic_write, safe_write};
pub use dirs::{ensure_dir, remove_dir_all};
