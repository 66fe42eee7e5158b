//! Error types for the runner.
//!
//! Uses `thiserror` for typed errors covering configuration loading, HTTP
//! client setup and the fatal end of the poll loop. Configuration errors are
//! reported by `main` before a [`RunnerError`] can arise.

use adept_core::scheduler::FatalError;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// A required setting is empty after environment overrides.
    #[error("missing required setting `{field}`")]
    Missing {
        /// Dotted path of the setting.
        field: &'static str,
    },

    /// A setting has an unusable value.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors that end the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The HTTP client could not be set up.
    #[error("HTTP client error: {0}")]
    Http(String),

    /// The poll loop hit an unrecoverable condition.
    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),
}
