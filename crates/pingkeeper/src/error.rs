use std::io::Error as IoError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid monitor or probe configuration. Raised once, at construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Target cannot be empty")]
    EmptyTarget,

    #[error("Interval must be greater than zero")]
    NonPositiveInterval,

    #[error("Timeout must be greater than zero")]
    NonPositiveTimeout,

    #[error("Max failures must be at least 1")]
    ZeroMaxFailures,

    #[error("Payload size must be at least 1 byte")]
    ZeroPayloadSize,

    #[error("Unsupported protocol: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client could not be built: {0}")]
    HttpClient(String),
}

/// Failure to launch or finish an external process.
///
/// A non-zero exit status is not an error; it is reported in the output.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: IoError,
    },

    #[error("`{program}` did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Failure to execute an action hook.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Failed to make {} executable: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("{0}")]
    Process(#[from] ProcessError),
}
