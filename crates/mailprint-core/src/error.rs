//! Error types for the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The settings file could not be read.
    #[error("Cannot read settings file {}: {source}", path.display())]
    ConfigRead {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid YAML or has unknown keys.
    #[error("Invalid settings file {}: {source}", path.display())]
    ConfigParse {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser error with line information.
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting has an unusable value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The converter or printer executable is not on the search path.
    #[error("Required program `{0}` was not found on PATH")]
    MissingTool(String),

    /// Connecting or re-authenticating to the mail store failed.
    #[error("Connection error: {0}")]
    Connection(#[source] mailprint_imap::Error),

    /// A mail store command failed.
    #[error("Mail store error: {0}")]
    Store(#[from] mailprint_imap::Error),

    /// Writing an artifact to the spool directory failed.
    #[error("Failed to write {}: {source}", path.display())]
    Extract {
        /// Artifact being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A fetched message could not be decoded.
    #[error("Message {0} could not be decoded")]
    Undecodable(mailprint_imap::SeqNum),

    /// An external converter or printer run failed.
    #[error("`{program}` failed: {reason}")]
    Command {
        /// Program that was run.
        program: String,
        /// Exit status or spawn error.
        reason: String,
    },

    /// The background fetch task died without reporting back.
    #[error("Fetch task failed: {0}")]
    FetchTask(String),
}

impl Error {
    /// Returns true if the error ends the current cycle.
    ///
    /// Everything else is logged and the cycle carries on without the
    /// affected message or artifact.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Store(_) | Self::Undecodable(_) | Self::Command { .. }
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
