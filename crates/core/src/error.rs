//! Error types shared across Quietwatch crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Quietwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running a watch
///
/// None of these are fatal to the process: a failed configuration stops the
/// watch from starting, a failed notification drops that one event, and a
/// failed ready emission drops that one result.
#[derive(Debug, Error)]
pub enum Error {
    /// A required watch parameter is absent
    #[error("cannot proceed without {0}")]
    ConfigurationMissing(&'static str),

    /// A parameter is present but unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file could not be read or written
    #[error("config file {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for `WatchConfig`
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be rendered as TOML
    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// The name pattern does not compile
    #[error("invalid name pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A single raw notification could not be filtered or routed
    #[error("notification for `{name}` dropped: {reason}")]
    NotificationHandling { name: String, reason: String },

    /// A ready result could not be produced or delivered
    #[error("ready result for `{key}` not delivered: {reason}")]
    DeadlineCallback { key: String, reason: String },

    /// The directory notification source failed
    #[error("notification source failed: {0}")]
    Source(String),

    /// Background tasks could not be started
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

impl Error {
    /// True for errors that mean the watch never started
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ConfigurationMissing(_)
                | Error::InvalidConfig(_)
                | Error::InvalidPattern { .. }
                | Error::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_missing_message() {
        let err = Error::ConfigurationMissing("root_path");
        assert_eq!(err.to_string(), "cannot proceed without root_path");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_runtime_errors_are_not_configuration() {
        let err = Error::NotificationHandling {
            name: "a.csv".to_string(),
            reason: "scheduler stopped".to_string(),
        };
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("a.csv"));
    }
}
