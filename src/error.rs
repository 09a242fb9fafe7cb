//! Structured error types for configuration loading.

use crate::config::decode::DecodeError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Source errors
    UnsupportedFormat,
    FileReadFailure,
    EnvBindingFailure,

    // Shape errors
    UnmarshalFailure,

    // Schema errors
    RequiredFieldMissing,
    UnsupportedDefault,
}

/// Underlying cause of a failed file read.
#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document root must be a mapping, found {0}")]
    NotAMapping(&'static str),
}

/// Errors surfaced while building or querying a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported file format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: ReadFailure,
    },

    #[error("failed to unmarshal configuration: {0}")]
    Unmarshal(#[from] DecodeError),

    #[error("required field {field} is not set")]
    RequiredFieldMissing { field: &'static str },

    #[error("failed to bind env var {var}: {reason}")]
    EnvBinding { var: String, reason: String },

    #[error("unsupported field type for default: {kind} (field {field})")]
    UnsupportedDefault {
        field: &'static str,
        kind: &'static str,
    },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            ConfigError::FileRead { .. } => ErrorCode::FileReadFailure,
            ConfigError::Unmarshal(_) => ErrorCode::UnmarshalFailure,
            ConfigError::RequiredFieldMissing { .. } => ErrorCode::RequiredFieldMissing,
            ConfigError::EnvBinding { .. } => ErrorCode::EnvBindingFailure,
            ConfigError::UnsupportedDefault { .. } => ErrorCode::UnsupportedDefault,
        }
    }

    pub(crate) fn file_read(path: impl Into<PathBuf>, source: impl Into<ReadFailure>) -> Self {
        ConfigError::FileRead {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RequiredFieldMissing).unwrap();
        assert_eq!(json, "\"REQUIRED_FIELD_MISSING\"");
    }

    #[test]
    fn test_file_read_message_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ConfigError::file_read("conf/app.yaml", io);
        assert_eq!(err.code(), ErrorCode::FileReadFailure);
        let message = err.to_string();
        assert!(message.starts_with("failed to read config file conf/app.yaml"));
        assert!(message.contains("no such file"));
    }

    #[test]
    fn test_required_field_message() {
        let err = ConfigError::RequiredFieldMissing {
            field: "Environment",
        };
        assert_eq!(err.to_string(), "required field Environment is not set");
    }
}
