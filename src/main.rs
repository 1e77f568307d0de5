//! projkit CLI entry point
//!
//! Parses arguments, runs the selected command and turns failures into a
//! non-zero exit code. Failed project operations have already printed their
//! status; any other error is shown with its suggestion.

use anyhow::Result;
use clap::Parser;
use projkit_cli::cli;
use projkit_cli::core::{ProjkitError, user_friendly_error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            if !matches!(e.downcast_ref::<ProjkitError>(), Some(ProjkitError::OperationFailed { .. })) {
                user_friendly_error(e).display();
            }
            std::process::exit(1);
        }
    }
}
