//! Core types shared by every layer of projkit
//!
//! - [`ProjkitError`] and [`ErrorContext`] for failures that abort an operation
//! - [`Status`] for the outcome of every project operation, successful or not
//!
//! The split mirrors how operations report: expected failures (bad input, a
//! resolver rejecting a dependency set, a requirement that cannot be met) come
//! back as an unsuccessful [`Status`], while I/O failures during persistence
//! and contract violations surface as `Err` values built from [`ProjkitError`].

pub mod error;
pub mod status;

pub use error::{ErrorContext, ProjkitError, user_friendly_error};
pub use status::{PROBLEMS_DESCRIPTION, Status};
