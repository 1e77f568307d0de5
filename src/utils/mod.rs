//! Utilities shared across projkit
//!
//! - [`fs`] - atomic writes and directory helpers
//! - [`project_lock`] - cross-process lock serializing transactions on one project

pub mod fs;
pub mod project_lock;

pub use fs::{atomic_write, ensure_dir, remove_dir_all, safe_write};
pub use project_lock::ProjectLock;
