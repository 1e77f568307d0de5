//! Configuration management for projkit
//!
//! projkit reads three kinds of configuration:
//!
//! 1. **Global configuration** (`~/.projkit/config.toml`) - which external
//!    tools resolve and build environments, download and lock timeouts.
//!    Handled here.
//! 2. **Project file** (`projkit.toml`) - edited in place through
//!    [`crate::document::ConfigDocument`], never through serde, so user
//!    comments and formatting survive.
//! 3. **Lock file** (`projkit.lock`) - see [`crate::lockfile`].
//!
//! ## Global Configuration (`~/.projkit/config.toml`)
//!
//! **Location:**
//! - Unix/macOS: `~/.projkit/config.toml`
//! - Windows: `%LOCALAPPDATA%\projkit\config.toml`
//! - Override: `--config <path>` or the `PROJKIT_CONFIG` environment variable
//!
//! ```toml
//! [tools]
//! resolver = ["projkit-conda-bridge"]
//! builder = ["projkit-conda-bridge"]
//!
//! [downloads]
//! timeout_secs = 300
//!
//! [transactions]
//! lock_timeout_secs = 120
//! ```
//!
//! A missing file is the same as an empty one: no resolver (locking reports
//! that one must be configured), no builder (environments are skipped).

pub mod global;

pub use global::{DownloadSettings, GlobalConfig, ToolSettings, TransactionSettings};
