//! Error types for the fines engine
//!
//! This module defines every error that can abort a run. Predictable per-record
//! outcomes (a rule rejecting a record, a backend `check` call saying
//! `allowed: false`, a merge key with no match) are data, not errors, and never
//! appear here.
//!
//! # Error Categories
//!
//! - **Configuration**: unknown action type, malformed rules, unresolved `ENV|` names
//! - **Session**: failed login, failed renewal, 401 after renewal
//! - **Transport**: persistent timeouts, connection failures, unexpected statuses
//! - **Data**: reference data sets that cannot be loaded, records missing a field
//!   an action needs
//! - **I/O**: settings files, exports

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, FinesError>;

/// Main error type for the fines engine
///
/// Every variant is fatal for the run that produced it: errors propagate to
/// the job runner and abort the whole run. Variants carry owned strings so the
/// type stays `Clone + PartialEq` for assertions in tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FinesError {
    /// Settings or rule configuration is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// An action config names a variant that is not in the dispatch table
    #[error("Unknown action type '{action_type}' in action '{action}'")]
    UnknownActionType {
        /// The offending `action_type` value
        action_type: String,
        /// Name of the action config that carried it
        action: String,
    },

    /// `ENV|<name>` indirection could not be resolved
    #[error("Unresolved variable '{name}' referenced by rule '{rule}'")]
    UnresolvedVariable {
        /// Variable name after the `ENV|` marker
        name: String,
        /// Rule that referenced it
        rule: String,
    },

    /// The initial login did not yield an access token
    #[error("Login failed{}: {message}", status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    LoginFailed {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Description of the failure
        message: String,
    },

    /// Exchanging the refresh token for a new pair failed
    #[error("Token renewal failed{}: {message}", status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    RenewalFailed {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Description of the failure
        message: String,
    },

    /// The backend still answered 401 after one renewal-and-replay cycle
    #[error("Unauthorized after token renewal: {method} {path}")]
    Unauthorized {
        /// HTTP method of the rejected call
        method: String,
        /// Path of the rejected call
        path: String,
    },

    /// Every attempt of a call timed out
    #[error("{method} {path} timed out after {attempts} attempts")]
    Timeout {
        /// HTTP method of the call
        method: String,
        /// Path of the call
        path: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// The backend answered with a status the caller did not accept
    #[error("{method} {path} returned status {status}: {body}")]
    HttpStatus {
        /// HTTP method of the call
        method: String,
        /// Path of the call
        path: String,
        /// Response status code
        status: u16,
        /// Response body, rendered for diagnostics
        body: String,
    },

    /// The request could not be sent or the response could not be read
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure
        message: String,
    },

    /// A response did not have the shape the caller requires
    #[error("Unexpected response from {path}: {message}")]
    MalformedResponse {
        /// Path of the call
        path: String,
        /// What was missing or wrong
        message: String,
    },

    /// A named reference data set could not be loaded
    #[error("Data set '{name}' could not be loaded: {message}")]
    Dataset {
        /// Data set name as referenced by the rule
        name: String,
        /// Description of the failure
        message: String,
    },

    /// A record lacks a field an action cannot proceed without
    #[error("Record {record} is missing field '{field}' required by {operation}")]
    MissingField {
        /// Record identifier (or `<unknown>`)
        record: String,
        /// Dot path of the missing field
        field: String,
        /// Operation that needed the field
        operation: String,
    },

    /// I/O error while reading settings or writing exports
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
    },

    /// JSON (de)serialization failed
    #[error("JSON error: {message}")]
    Json {
        /// Description of the JSON error
        message: String,
    },
}

impl From<std::io::Error> for FinesError {
    fn from(error: std::io::Error) -> Self {
        FinesError::Io {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for FinesError {
    fn from(error: serde_json::Error) -> Self {
        FinesError::Json {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for FinesError {
    fn from(error: csv::Error) -> Self {
        FinesError::Io {
            message: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for FinesError {
    fn from(error: config::ConfigError) -> Self {
        FinesError::Config {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl FinesError {
    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        FinesError::Config {
            message: message.into(),
        }
    }

    /// Create an UnknownActionType error
    pub fn unknown_action_type(action_type: &str, action: &str) -> Self {
        FinesError::UnknownActionType {
            action_type: action_type.to_string(),
            action: action.to_string(),
        }
    }

    /// Create an UnresolvedVariable error
    pub fn unresolved_variable(name: &str, rule: &str) -> Self {
        FinesError::UnresolvedVariable {
            name: name.to_string(),
            rule: rule.to_string(),
        }
    }

    /// Create a LoginFailed error
    pub fn login_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        FinesError::LoginFailed {
            status,
            message: message.into(),
        }
    }

    /// Create a RenewalFailed error
    pub fn renewal_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        FinesError::RenewalFailed {
            status,
            message: message.into(),
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(method: &str, path: &str) -> Self {
        FinesError::Unauthorized {
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(method: &str, path: &str, attempts: u32) -> Self {
        FinesError::Timeout {
            method: method.to_string(),
            path: path.to_string(),
            attempts,
        }
    }

    /// Create an HttpStatus error
    pub fn http_status(method: &str, path: &str, status: u16, body: impl Into<String>) -> Self {
        FinesError::HttpStatus {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body: body.into(),
        }
    }

    /// Create a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        FinesError::Transport {
            message: message.into(),
        }
    }

    /// Create a MalformedResponse error
    pub fn malformed_response(path: &str, message: impl Into<String>) -> Self {
        FinesError::MalformedResponse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Create a Dataset error
    pub fn dataset(name: &str, message: impl Into<String>) -> Self {
        FinesError::Dataset {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(record: Option<&str>, field: &str, operation: &str) -> Self {
        FinesError::MissingField {
            record: record.unwrap_or("<unknown>").to_string(),
            field: field.to_string(),
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::config(
        FinesError::Config { message: "missing base_url".to_string() },
        "Configuration error: missing base_url"
    )]
    #[case::unknown_action_type(
        FinesError::UnknownActionType { action_type: "RefundAll".to_string(), action: "nightly".to_string() },
        "Unknown action type 'RefundAll' in action 'nightly'"
    )]
    #[case::login_failed_with_status(
        FinesError::LoginFailed { status: Some(422), message: "bad credentials".to_string() },
        "Login failed with status 422: bad credentials"
    )]
    #[case::login_failed_without_status(
        FinesError::LoginFailed { status: None, message: "connection refused".to_string() },
        "Login failed: connection refused"
    )]
    #[case::unauthorized(
        FinesError::Unauthorized { method: "GET".to_string(), path: "/accounts".to_string() },
        "Unauthorized after token renewal: GET /accounts"
    )]
    #[case::timeout(
        FinesError::Timeout { method: "POST".to_string(), path: "/accounts/1/pay".to_string(), attempts: 5 },
        "POST /accounts/1/pay timed out after 5 attempts"
    )]
    #[case::http_status(
        FinesError::HttpStatus { method: "GET".to_string(), path: "/users/9".to_string(), status: 500, body: "boom".to_string() },
        "GET /users/9 returned status 500: boom"
    )]
    #[case::missing_field(
        FinesError::MissingField { record: "42".to_string(), field: "patron.id".to_string(), operation: "block".to_string() },
        "Record 42 is missing field 'patron.id' required by block"
    )]
    fn test_error_display(#[case] error: FinesError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::unknown_action_type(
        FinesError::unknown_action_type("RefundAll", "nightly"),
        FinesError::UnknownActionType { action_type: "RefundAll".to_string(), action: "nightly".to_string() }
    )]
    #[case::timeout(
        FinesError::timeout("GET", "/accounts", 5),
        FinesError::Timeout { method: "GET".to_string(), path: "/accounts".to_string(), attempts: 5 }
    )]
    #[case::missing_field_unknown_record(
        FinesError::missing_field(None, "patron.id", "block"),
        FinesError::MissingField { record: "<unknown>".to_string(), field: "patron.id".to_string(), operation: "block".to_string() }
    )]
    fn test_helper_functions(#[case] result: FinesError, #[case] expected: FinesError) {
        assert_eq!(result, expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: FinesError = io_error.into();
        assert!(matches!(error, FinesError::Io { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: FinesError = json_error.into();
        assert!(matches!(error, FinesError::Json { .. }));
    }
}
