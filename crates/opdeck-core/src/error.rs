//! Error types for the opdeck console core.
//!
//! Every operation the console exposes returns one of these variants so the
//! RPC layer can hand a structured, user-facing outcome back to the caller.
//! Transient per-process read failures never appear here; the snapshot layer
//! swallows them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for console operations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    // Registry lookups
    #[error("Unknown service: {name}")]
    UnknownService { name: String },

    #[error("Application is not in the allowed list: {key}")]
    NotAllowed { key: String },

    // Lifecycle preconditions
    #[error("{service} is already running")]
    AlreadyRunning { service: String },

    #[error("{service} is not running")]
    NotRunning { service: String },

    // Launch failures
    #[error("Executable not found for {target}: {program}. Is it in your PATH?")]
    LaunchNotFound { target: String, program: String },

    #[error("Failed to start {target}: {message}")]
    LaunchFailed { target: String, message: String },

    // Signal delivery
    #[error("Process {pid} exited before it could be signalled")]
    ProcessVanished { pid: u32 },

    #[error("Permission denied signalling process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("No running process named {name}")]
    NotFound { name: String },

    // Scripts
    #[error("Script not found: {0}")]
    ScriptNotFound(PathBuf),

    // Accelerator
    #[error("GPU management tool is not available")]
    AcceleratorUnavailable,

    // Health probes
    #[error("Probe of {service} failed: {message}")]
    Probe { service: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for console operations.
pub type Result<T> = std::result::Result<T, ConsoleError>;

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ConsoleError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ConsoleError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Probe/network error
    /// - -32005: Validation error
    /// - -32010: Lifecycle precondition (already running / not running)
    /// - -32011: Launch failure
    /// - -32012: Refused (permission or whitelist)
    /// - -32013: Target not found
    /// - -32014: Accelerator unavailable
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            ConsoleError::Probe { .. } => -32000,

            ConsoleError::Validation { .. } | ConsoleError::Config { .. } => -32005,

            ConsoleError::AlreadyRunning { .. } | ConsoleError::NotRunning { .. } => -32010,

            ConsoleError::LaunchNotFound { .. } | ConsoleError::LaunchFailed { .. } => -32011,

            ConsoleError::PermissionDenied { .. } | ConsoleError::NotAllowed { .. } => -32012,

            ConsoleError::NotFound { .. }
            | ConsoleError::ScriptNotFound(_)
            | ConsoleError::ProcessVanished { .. }
            | ConsoleError::UnknownService { .. } => -32013,

            ConsoleError::AcceleratorUnavailable => -32014,

            _ => -32603,
        }
    }

    /// Whether the error is a benign race with the process table.
    ///
    /// A witness that exited between the check and the signal ends up in the
    /// state the caller asked for.
    pub fn is_benign_race(&self) -> bool {
        matches!(self, ConsoleError::ProcessVanished { .. })
    }
}
