//! Commands declared under `[commands]`.

use std::fmt;
use std::str::FromStr;

/// The ways a command can be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Unix,
    Windows,
    Notebook,
    BokehApp,
}

impl CommandType {
    pub const ALL: [Self; 4] = [Self::Unix, Self::Windows, Self::Notebook, Self::BokehApp];

    /// Key in the project file.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Unix => "unix",
            Self::Windows => "windows",
            Self::Notebook => "notebook",
            Self::BokehApp => "bokeh_app",
        }
    }

    /// Whether a command of type `self` may also have a `other` command line.
    ///
    /// Only `unix` and `windows` go together.
    pub fn combines_with(self, other: Self) -> bool {
        self == other
            || matches!((self, other), (Self::Unix, Self::Windows) | (Self::Windows, Self::Unix))
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.key() == s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|t| t.key()).collect();
            format!("Unknown command type '{s}', expected one of: {}", known.join(", "))
        })
    }
}

/// A runnable command of the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCommand {
    pub name: String,
    pub description: Option<String>,
    /// Env spec the command runs in
    pub env_spec: String,
    pub supports_http_options: bool,
    /// Command lines by type, in [`CommandType::ALL`] order
    pub command_lines: Vec<(CommandType, String)>,
}

impl ProjectCommand {
    pub fn command_line(&self, command_type: CommandType) -> Option<&str> {
        self.command_lines
            .iter()
            .find(|(t, _)| *t == command_type)
            .map(|(_, line)| line.as_str())
    }

    /// Description if given, else the first command line.
    pub fn summary(&self) -> &str {
        self.description
            .as_deref()
            .or_else(|| self.command_lines.first().map(|(_, line)| line.as_str()))
            .unwrap_or(&self.name)
    }
}
