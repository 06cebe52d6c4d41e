//! # Runtime Error Types
//!
//! Recoverable failures of the runtime. Contract violations (suspending
//! another thread, resuming a finished one, misusing the region) panic
//! instead; they are bugs in the caller, not conditions to handle.

use thiserror::Error;

/// Errors that can occur while configuring or driving the runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The OS refused to create the thread backing a logical thread.
    #[error("failed to spawn logical thread `{name}`: {reason}")]
    SpawnFailed {
        /// Name the thread would have had.
        name: String,
        /// Error reported by the OS.
        reason: String,
    },

    /// A joined logical thread panicked.
    #[error("logical thread `{name}` panicked: {message}")]
    ThreadPanicked {
        /// Name of the thread.
        name: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("cannot read configuration file {path}: {reason}")]
    ConfigIo {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        reason: String,
    },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
