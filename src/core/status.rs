//! Uniform outcome of every project operation.

use std::fmt;

/// Description used when an operation is refused because the project already has problems.
pub const PROBLEMS_DESCRIPTION: &str = "Unable to load the project.";

/// Outcome of a project operation.
///
/// Every mutating operation returns a `Status`, whether it succeeded or failed
/// for an expected reason. Callers test [`Status::is_success`] and show
/// `description`, `logs` and `errors` to the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    /// Whether the operation succeeded
    pub success: bool,
    /// One-line summary of the outcome
    pub description: String,
    /// Progress messages in the order they were produced
    pub logs: Vec<String>,
    /// Error messages in the order they were produced
    pub errors: Vec<String>,
}

impl Status {
    /// A successful outcome.
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            success: true,
            description: description.into(),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A failed outcome.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            success: false,
            description: description.into(),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// The failure returned when the project has problems.
    ///
    /// Each problem becomes one entry of `errors`.
    pub fn problems(description: impl Into<String>, problems: &[String]) -> Self {
        Self::failure(description).with_errors(problems.iter().cloned())
    }

    /// Append log lines.
    #[must_use]
    pub fn with_logs<I, S>(mut self, logs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logs.extend(logs.into_iter().map(Into::into));
        self
    }

    /// Append error lines.
    #[must_use]
    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors.extend(errors.into_iter().map(Into::into));
        self
    }

    /// Append a single error line.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Put `logs` in front of this status' own logs.
    #[must_use]
    pub fn prepend_logs(mut self, mut logs: Vec<String>) -> Self {
        logs.append(&mut self.logs);
        self.logs = logs;
        self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.logs {
            writeln!(f, "{line}")?;
        }
        for line in &self.errors {
            writeln!(f, "{line}")?;
        }
        write!(f, "{}", self.description)
    }
}
