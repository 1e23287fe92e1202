//! Custom error types for the library.
//!
//! `ImpError` is the single error type returned by every fallible operation in
//! the crate. Using `thiserror`, it groups the failures that can occur while
//! driving an LCR meter sweep:
//!
//! - **`Config`**: wraps errors from the `config` crate, typically a missing
//!   file or a syntax problem in the key-value source.
//! - **`Configuration`**: semantic errors in an otherwise readable configuration,
//!   such as a missing key, an unparseable number or a zero sweep step.
//! - **`Connection`**: the instrument could not be found or claimed.
//! - **`Device`**: the instrument rejected a command, timed out or answered with
//!   something that does not parse.
//! - **`Io`** / **`Csv`**: file system failures while reading or writing files.
//! - **`FeatureNotEnabled`**: functionality compiled out via feature flags.
//!
//! `ImpError::kind` folds these into the four coarse categories used for user
//! facing reporting.

use std::fmt;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ImpError>;

/// Every failure the library reports.
#[derive(Error, Debug)]
pub enum ImpError {
    /// The configuration source could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A configuration value is missing, malformed or out of range.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The instrument could not be opened or identified.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The instrument rejected a command or answered badly.
    #[error("Device error: {0}")]
    Device(String),

    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while encoding the result table.
    #[error("Result file error: {0}")]
    Csv(#[from] csv::Error),

    /// Sweep results that cannot be combined into one table.
    #[error("Data processing error: {0}")]
    Processing(String),

    /// Functionality compiled out via a cargo feature.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

/// Coarse error category reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing configuration value.
    Config,
    /// Device not found or could not be claimed.
    Connection,
    /// Malformed response, unsupported command or timeout.
    Device,
    /// File read/write failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::Device => "device",
            ErrorKind::Io => "i/o",
        };
        f.write_str(name)
    }
}

impl ImpError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImpError::Config(_) | ImpError::Configuration(_) => ErrorKind::Config,
            ImpError::Connection(_) | ImpError::FeatureNotEnabled(_) => ErrorKind::Connection,
            ImpError::Device(_) => ErrorKind::Device,
            ImpError::Io(_) | ImpError::Csv(_) | ImpError::Processing(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ImpError::Configuration(msg.into())
    }

    pub(crate) fn device(msg: impl Into<String>) -> Self {
        ImpError::Device(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        assert_eq!(ImpError::config("bad step").kind(), ErrorKind::Config);
        assert_eq!(
            ImpError::Connection("busy".into()).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            ImpError::FeatureNotEnabled("instrument_visa".into()).kind(),
            ErrorKind::Connection
        );
        assert_eq!(ImpError::device("timeout").kind(), ErrorKind::Device);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert_eq!(ImpError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn feature_message_names_the_flag() {
        let err = ImpError::FeatureNotEnabled("instrument_visa".into());
        assert!(err.to_string().contains("--features instrument_visa"));
    }
}
