//! Error types for config loading, password resolution, and sending.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

/// A sending-method configuration structure was invalid.
///
/// Carries the path of the config file the structure came from, when known, so
/// the rendered message can point at it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}Invalid configuration: {details}", path_prefix(.configpath))]
pub struct InvalidConfigError {
    /// Description of what was wrong with the configuration.
    pub details: String,
    /// Path to the file the configuration was read from, if any.
    pub configpath: Option<PathBuf>,
}

impl InvalidConfigError {
    /// Creates an error without an attached config path.
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            configpath: None,
        }
    }

    /// Attaches a config path if one is not already set.
    pub fn attribute(&mut self, configpath: Option<&Path>) {
        if self.configpath.is_none() {
            self.configpath = configpath.map(Path::to_path_buf);
        }
    }
}

/// A password specifier was invalid or could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}Invalid password configuration: {details}", path_prefix(.configpath))]
pub struct InvalidPasswordError {
    /// Description of what was wrong with the password specifier.
    pub details: String,
    /// Path to the file the specifier was read from, if any.
    pub configpath: Option<PathBuf>,
}

impl InvalidPasswordError {
    /// Creates an error without an attached config path.
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
            configpath: None,
        }
    }

    /// Attaches a config path if one is not already set.
    pub fn attribute(&mut self, configpath: Option<&Path>) {
        if self.configpath.is_none() {
            self.configpath = configpath.map(Path::to_path_buf);
        }
    }
}

fn path_prefix(configpath: &Option<PathBuf>) -> String {
    configpath
        .as_ref()
        .map(|p| format!("{}: ", p.display()))
        .unwrap_or_default()
}

/// No sending configuration was found in any of the consulted files.
///
/// `configpaths` lists every file that was checked. After a fallback the
/// default file comes first and the originally requested file last, the
/// reverse of the checking order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("outgoing configuration not found in files: {}", join_paths(.configpaths))]
pub struct MissingConfigError {
    /// Every file consulted for configuration.
    pub configpaths: Vec<PathBuf>,
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A netrc lookup completed but did not yield a usable entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct NetrcLookupError {
    /// Description of why the lookup failed.
    pub message: String,
}

impl NetrcLookupError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A netrc file could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}: netrc parse error at line {line}: {message}", .path.display())]
pub struct NetrcParseError {
    /// Description of the syntax problem.
    pub message: String,
    /// One-based line number where parsing failed.
    pub line: usize,
    /// Path of the file being parsed.
    pub path: PathBuf,
}

/// Errors that can occur while loading configuration or sending mail.
#[derive(Debug, Error)]
pub enum Error {
    /// A sending-method configuration structure was invalid.
    #[error(transparent)]
    InvalidConfig(#[from] InvalidConfigError),

    /// A password specifier was invalid or could not be resolved.
    #[error(transparent)]
    InvalidPassword(#[from] InvalidPasswordError),

    /// No sending configuration was found in any consulted file.
    #[error(transparent)]
    MissingConfig(#[from] MissingConfigError),

    /// A netrc lookup did not yield a usable entry.
    #[error(transparent)]
    NetrcLookup(#[from] NetrcLookupError),

    /// A netrc file could not be parsed.
    #[error(transparent)]
    NetrcParse(#[from] NetrcParseError),

    /// A TOML config file could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON config file could not be parsed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SMTP conversation failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mailout_smtp::Error),

    /// An external sending command exited unsuccessfully.
    #[error("command {command:?} exited with {status}: {stderr}")]
    Command {
        /// The command line that was run.
        command: String,
        /// Exit status the command finished with.
        status: ExitStatus,
        /// Captured standard error output.
        stderr: String,
    },

    /// The message could not be sent as given.
    #[error("cannot send message: {0}")]
    UnsupportedEmail(String),
}

/// Result type alias defaulting to our Error type.
///
/// The error parameter can be overridden for functions that fail with one
/// specific error kind before it is widened into [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
