use std::{fmt, io};

use http::status::StatusCode;
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Could not parse seed line: {0}")]
    Parse(String),
    #[error("Error connecting to OCL during {operation} ({url}): {cause}")]
    UpstreamConnection {
        operation: String,
        url: String,
        cause: String,
    },
    #[error("OCL returned {status} during {operation} ({url})")]
    UpstreamStatus {
        operation: String,
        url: String,
        status: StatusCode,
    },
    #[error("Malformed response during {operation}: {cause}")]
    MalformedResponse { operation: String, cause: String },
    #[error("No released or HEAD version available for source {0}")]
    NoVersionsAvailable(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    pub fn connection(
        operation: impl Into<String>,
        url: impl fmt::Display,
        cause: impl fmt::Display,
    ) -> Self {
        SyncError::UpstreamConnection {
            operation: operation.into(),
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn status(operation: impl Into<String>, url: impl fmt::Display, status: StatusCode) -> Self {
        SyncError::UpstreamStatus {
            operation: operation.into(),
            url: url.to_string(),
            status,
        }
    }

    pub fn malformed(operation: impl Into<String>, cause: impl fmt::Display) -> Self {
        SyncError::MalformedResponse {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Only malformed seed lines are skipped over; everything else stops the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::Parse(_))
    }

    /// True for failures that originate on the OCL side of the connection.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SyncError::UpstreamConnection { .. }
                | SyncError::UpstreamStatus { .. }
                | SyncError::MalformedResponse { .. }
        )
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(src: toml::de::Error) -> SyncError {
        SyncError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<JsonError> for SyncError {
    fn from(src: JsonError) -> SyncError {
        SyncError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for SyncError {
    fn from(src: UrlParseError) -> SyncError {
        SyncError::Configuration(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for SyncError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => SyncError::Configuration(format!("{x}")),
            _ => SyncError::Io(format!("IOError: {}", x.kind())),
        }
    }
}
