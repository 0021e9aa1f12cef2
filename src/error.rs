use std::time::Duration;

use thiserror::Error;

use crate::domain::FailureClass;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors raised by ledger, signer and token ports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rejected by network: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl LedgerError {
    /// How a batch report should classify this error.
    ///
    /// Signing failures are deterministic for a given input, so they are
    /// grouped with rejections rather than transient faults.
    #[must_use]
    pub const fn classification(&self) -> FailureClass {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::InvalidResponse(_) => {
                FailureClass::Transient
            }
            Self::Rejected(_) | Self::Signing(_) => FailureClass::Rejection,
        }
    }
}

/// Errors that abort a whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("failed to fetch network parameters: {0}")]
    NetworkParameters(#[source] LedgerError),

    #[error("failed to read accounts file {path}: {reason}")]
    Accounts { path: String, reason: String },

    #[error("treasury account is not configured: {0}")]
    Treasury(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        // dialoguer::Error wraps an IO error
        Error::Io(std::io::Error::other(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_timeouts_are_transient() {
        assert_eq!(
            LedgerError::Transport("reset".into()).classification(),
            FailureClass::Transient
        );
        assert_eq!(
            LedgerError::Timeout(Duration::from_secs(3)).classification(),
            FailureClass::Transient
        );
    }

    #[test]
    fn rejections_and_signing_are_terminal() {
        assert_eq!(
            LedgerError::Rejected("overspend".into()).classification(),
            FailureClass::Rejection
        );
        assert_eq!(
            LedgerError::Signing("bad key".into()).classification(),
            FailureClass::Rejection
        );
    }

    #[test]
    fn config_error_messages_name_the_field() {
        let err = ConfigError::InvalidValue {
            field: "max_concurrent",
            reason: "must be greater than 0".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for max_concurrent: must be greater than 0"
        );
    }
}
