//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration sources.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading a configuration file.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file contained invalid JSON.
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The configuration file parsed but violated the schema.
    #[error("Invalid ngssc.json at {} ({message})", path.display())]
    Invalid {
        /// Path of the offending file.
        path: PathBuf,
        /// Description of the violated constraint.
        message: String,
    },
}
