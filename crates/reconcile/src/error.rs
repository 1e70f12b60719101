//! Error types for reconciliation.
//!
//! Errors are categorized so the orchestrator can tell the fatal ones
//! (a corrupt state file, an unparseable declaration) from the best-effort
//! remote failures that are reported and skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Declaration could not be read or parsed
    Spec,
    /// Declaration parsed but was rejected by the validator
    Validation,
    /// State could not be read, parsed, or written
    State,
    /// Requested state entry does not exist
    NotFound,
    /// A remote host interaction failed
    Remote,
    /// The engine itself could not run (worker pool setup)
    Runtime,
}

impl ErrorCategory {
    /// Whether a run must stop when this category is encountered.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Spec | Self::Validation | Self::State | Self::Runtime
        )
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Spec => "Invalid declaration",
            Self::Validation => "Declaration failed validation",
            Self::State => "State file problem",
            Self::NotFound => "Not found in state",
            Self::Remote => "Remote host error",
            Self::Runtime => "Internal error",
        }
    }
}

/// Errors that can occur while reconciling declared resources.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed declaration
    #[error("invalid declaration {}: {message}", path.display())]
    SpecParse {
        /// Declaration file that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// One or more resources failed the files-and-packages rule
    #[error("validation failed for: {}", rejected.join(", "))]
    Validation {
        /// Names of every rejected resource
        rejected: Vec<String>,
    },

    /// State data unreadable, unparseable, or unwritable
    #[error("state error: {message}")]
    StateIo {
        /// What went wrong
        message: String,
        /// Underlying IO error, when there is one
        #[source]
        source: Option<std::io::Error>,
    },

    /// No state entry with this name
    #[error("resource {name} not found in state")]
    NotFound {
        /// Resource name that was looked up
        name: String,
    },

    /// Could not open a session to the host
    #[error("could not connect to {host}: {message}")]
    RemoteConnection {
        /// Host address
        host: String,
        /// Transport message
        message: String,
    },

    /// Remote command ran and exited unsuccessfully
    #[error("command `{command}` failed on {host}: {stderr}")]
    RemoteCommand {
        /// Host address
        host: String,
        /// Command line that was executed
        command: String,
        /// Standard error output
        stderr: String,
    },

    /// File upload failed
    #[error("transfer of {local} to {host}:{remote} failed: {message}")]
    Transfer {
        /// Host address
        host: String,
        /// Local source path
        local: String,
        /// Remote destination path
        remote: String,
        /// Transport message
        message: String,
    },

    /// Worker threads for a parallel deploy could not be started
    #[error("failed to create worker pool: {0}")]
    WorkerPool(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::SpecParse { .. } => ErrorCategory::Spec,
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::StateIo { .. } => ErrorCategory::State,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::RemoteConnection { .. }
            | Error::RemoteCommand { .. }
            | Error::Transfer { .. } => ErrorCategory::Remote,
            Error::WorkerPool(_) => ErrorCategory::Runtime,
        }
    }

    /// Whether this is a best-effort remote failure.
    pub fn is_remote(&self) -> bool {
        self.category() == ErrorCategory::Remote
    }

    /// Whether a run must stop on this error.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Error::StateIo {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn state_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::StateIo {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;
