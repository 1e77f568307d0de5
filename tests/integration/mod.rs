//! Integration tests for projkit.
//!
//! Library-level scenarios drive a [`Coordinator`] with the fake resolver and
//! prepare engine from `projkit_cli::test_utils`; `cli` runs the built binary.
//!
//! [`Coordinator`]: projkit_cli::transaction::Coordinator

#[path = "../common/mod.rs"]
mod common;

mod atomicity;
mod cli;
mod locking;
