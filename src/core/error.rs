//! Error handling for projkit
//!
//! Two layers cooperate here:
//! - [`ProjkitError`] - enumerated failure cases for code that needs to match on them
//! - [`ErrorContext`] - a wrapper adding a suggestion and details for CLI display
//!
//! Expected failures of project operations (bad input, resolver rejection, an
//! unmet requirement) are not errors at all: they are reported through
//! [`Status`](crate::core::Status). The types in this module cover the cases
//! that must abort: I/O failures while persisting, malformed external tool
//! output, and broken internal contracts.
//!
//! # Examples
//!
//! ```rust,no_run
//! use projkit_cli::core::{ProjkitError, user_friendly_error};
//!
//! let error = ProjkitError::ResolverNotConfigured;
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for projkit operations
///
/// # Error Categories
///
/// ## File System
/// - [`IoError`] - Standard I/O errors from [`std::io::Error`]
/// - [`FileSystemError`] - A named file operation failed
/// - [`PermissionDenied`] - Insufficient permissions
///
/// ## Documents
/// - [`ProjectFileParseError`] - A project, lock or state document is not valid TOML
/// - [`TomlError`] - TOML parsing errors from [`toml::de::Error`]
/// - [`ConfigError`] - Global configuration problems
///
/// ## External tools
/// - [`ResolverNotConfigured`] - No dependency resolver command is configured
/// - [`ExternalCommandFailed`] - A resolver or builder command exited with an error
/// - [`ExternalCommandInvalidOutput`] - A resolver or builder produced unreadable output
///
/// ## Requirements
/// - [`DownloadFailed`] - A download could not be fetched
/// - [`ChecksumMismatch`] - A downloaded file does not match its declared hash
///
/// ## Internal
/// - [`ContractViolation`] - A collaborator broke its contract (programmer error)
/// - [`ProjectLockTimeout`] - Another process holds the project lock
/// - [`OperationFailed`] - An operation's status was a failure
///
/// [`IoError`]: ProjkitError::IoError
/// [`FileSystemError`]: ProjkitError::FileSystemError
/// [`PermissionDenied`]: ProjkitError::PermissionDenied
/// [`ProjectFileParseError`]: ProjkitError::ProjectFileParseError
/// [`TomlError`]: ProjkitError::TomlError
/// [`ConfigError`]: ProjkitError::ConfigError
/// [`ResolverNotConfigured`]: ProjkitError::ResolverNotConfigured
/// [`ExternalCommandFailed`]: ProjkitError::ExternalCommandFailed
/// [`ExternalCommandInvalidOutput`]: ProjkitError::ExternalCommandInvalidOutput
/// [`DownloadFailed`]: ProjkitError::DownloadFailed
/// [`ChecksumMismatch`]: ProjkitError::ChecksumMismatch
/// [`ContractViolation`]: ProjkitError::ContractViolation
/// [`ProjectLockTimeout`]: ProjkitError::ProjectLockTimeout
/// [`OperationFailed`]: ProjkitError::OperationFailed
#[derive(Error, Debug)]
pub enum ProjkitError {
    /// A document could not be parsed
    #[error("Failed to parse {file}: {reason}")]
    ProjectFileParseError {
        /// File name of the document
        file: String,
        /// Parser message
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// No resolver command configured
    ///
    /// Locking requires an external resolver. It is configured in the
    /// `[tools]` table of the global configuration file.
    #[error("No dependency resolver is configured")]
    ResolverNotConfigured,

    /// An external resolver or builder command failed
    #[error("{program} {operation} failed: {stderr}")]
    ExternalCommandFailed {
        /// Program that was run
        program: String,
        /// Sub-operation (`resolve`, `build`, `remove`)
        operation: String,
        /// Trimmed error output
        stderr: String,
    },

    /// An external command answered with output that could not be decoded
    #[error("{program} produced invalid output: {reason}")]
    ExternalCommandInvalidOutput {
        /// Program that was run
        program: String,
        /// Decoder message
        reason: String,
    },

    /// A download could not be completed
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// URL being fetched
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// File integrity verification failed
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Downloaded file
        path: String,
        /// Declared digest
        expected: String,
        /// Computed digest
        actual: String,
    },

    /// A collaborator violated its contract
    ///
    /// This is a programming error rather than a user-facing failure, for
    /// example a prepare engine that omits the status for a requested
    /// requirement.
    #[error("Internal contract violated: {message}")]
    ContractViolation {
        /// What was expected and not found
        message: String,
    },

    /// A project operation reported failure through its status
    ///
    /// The status has already been shown to the user; this only carries the
    /// failure to the process exit code.
    #[error("{description}")]
    OperationFailed {
        /// Description of the failed status
        description: String,
    },

    /// Timed out waiting for another process to release the project lock
    #[error("Timed out after {timeout:?} waiting for the lock on project {project}{}", holder_note(.holder))]
    ProjectLockTimeout {
        /// Project directory
        project: String,
        /// Process id recorded by the holder
        holder: Option<u32>,
        /// Timeout that elapsed
        timeout: std::time::Duration,
    },

    /// A named file system operation failed
    #[error("File system error during {operation}: {path}")]
    FileSystemError {
        /// Operation that failed
        operation: String,
        /// Affected path
        path: String,
    },

    /// Insufficient permissions
    #[error("Permission denied: {operation} on {path}")]
    PermissionDenied {
        /// Operation that failed
        operation: String,
        /// Affected path
        path: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

fn holder_note(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (held by process {pid})")).unwrap_or_default()
}

impl Clone for ProjkitError {
    fn clone(&self) -> Self {
        match self {
            Self::ProjectFileParseError {
                file,
                reason,
            } => Self::ProjectFileParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::ResolverNotConfigured => Self::ResolverNotConfigured,
            Self::ExternalCommandFailed {
                program,
                operation,
                stderr,
            } => Self::ExternalCommandFailed {
                program: program.clone(),
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::ExternalCommandInvalidOutput {
                program,
                reason,
            } => Self::ExternalCommandInvalidOutput {
                program: program.clone(),
                reason: reason.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::ChecksumMismatch {
                path,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                path: path.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            Self::ContractViolation {
                message,
            } => Self::ContractViolation {
                message: message.clone(),
            },
            Self::OperationFailed {
                description,
            } => Self::OperationFailed {
                description: description.clone(),
            },
            Self::ProjectLockTimeout {
                project,
                holder,
                timeout,
            } => Self::ProjectLockTimeout {
                project: project.clone(),
                holder: *holder,
                timeout: *timeout,
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::PermissionDenied {
                operation,
                path,
            } => Self::PermissionDenied {
                operation: operation.clone(),
                path: path.clone(),
            },
            // io::Error is not Clone; keep the kind and the message
            Self::IoError(e) => Self::IoError(std::io::Error::new(e.kind(), e.to_string())),
            Self::TomlError(e) => Self::TomlError(e.clone()),
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// # Examples
///
/// ```rust,no_run
/// use projkit_cli::core::{ProjkitError, ErrorContext};
///
/// let context = ErrorContext::new(ProjkitError::ResolverNotConfigured)
///     .with_suggestion("Add a resolver command to ~/.projkit/config.toml")
///     .with_details("Locking dependencies needs an external resolver");
/// context.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying projkit error
    pub error: ProjkitError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a [`ProjkitError`]
    #[must_use]
    pub const fn new(error: ProjkitError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    ///
    /// Suggestions are displayed in green in the terminal.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    ///
    /// Details are displayed in yellow in the terminal.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`ProjkitError`] variants and [`std::io::Error`] kinds;
/// anything else is reported with its full cause chain.
///
/// # Examples
///
/// ```rust,no_run
/// use projkit_cli::core::user_friendly_error;
///
/// let error = anyhow::anyhow!("Something went wrong");
/// let context = user_friendly_error(error);
/// context.display();
/// ```
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(projkit_error) = error.downcast_ref::<ProjkitError>() {
        return create_error_context(projkit_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(ProjkitError::PermissionDenied {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check file ownership and permissions in the project directory")
                .with_details("projkit could not read or write one of its files");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(ProjkitError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(
                    "This error occurs when a required file or directory cannot be found",
                );
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(ProjkitError::Other {
        message,
    })
}

/// Map each [`ProjkitError`] variant to a context with tailored suggestions
fn create_error_context(error: ProjkitError) -> ErrorContext {
    match &error {
        ProjkitError::ResolverNotConfigured => ErrorContext::new(error)
            .with_suggestion(
                "Set `resolver = [\"<command>\"]` under [tools] in ~/.projkit/config.toml",
            )
            .with_details("Locking and updating dependencies delegate to an external resolver"),
        ProjkitError::ExternalCommandFailed {
            program,
            ..
        } => {
            let suggestion = format!("Run '{program}' by hand to see its full output");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        ProjkitError::ExternalCommandInvalidOutput {
            ..
        } => ErrorContext::new(error)
            .with_details("The resolver protocol expects a JSON document on stdout"),
        ProjkitError::ProjectFileParseError {
            file,
            ..
        } => {
            let suggestion = format!("Fix the syntax of {file}; projkit will not overwrite it");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        ProjkitError::TomlError(_) => ErrorContext::new(error)
            .with_suggestion("Check the TOML syntax of the file. Verify quotes, brackets, and value types"),
        ProjkitError::ChecksumMismatch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Verify the URL and the hash declared in projkit.toml"),
        ProjkitError::ProjectLockTimeout {
            holder,
            ..
        } => {
            let suggestion = match holder {
                Some(pid) => format!("Process {pid} is working on this project; retry when it finishes"),
                None => "Another projkit process is working on this project; retry when it finishes"
                    .to_string(),
            };
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("The wait can be changed with `lock_timeout_secs` under [transactions]")
        }
        ProjkitError::ContractViolation {
            ..
        } => ErrorContext::new(error)
            .with_details("This is a bug in projkit or in one of its collaborators"),
        _ => ErrorContext::new(error),
    }
}
