//! Error handling for the enrichment pipeline.
//!
//! Most variants abort a run. The lookup family (`NetworkError`, `Timeout`,
//! `LookupFailure`, `ParseError`) only ever describes a single address and is
//! folded into an `"Error"` record before it can reach the caller.

use std::fmt;
use std::time::Duration;

/// Main error type for extraction, lookup and output operations.
#[derive(Debug, Clone)]
pub enum GeoEnrichError {
    /// Source or destination file suffix is not one we can handle
    UnsupportedFormat {
        path: String,
    },

    /// Column identifier is not a single letter A-Z
    InvalidColumn {
        column: String,
        reason: String,
    },

    /// A delimited-text row is shorter than the requested column
    MissingColumn {
        row: usize,
        column: String,
    },

    /// Source file could not be opened or parsed
    FileError {
        path: String,
        message: String,
    },

    /// Network-related errors (connection refused, DNS, TLS, etc.)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// A lookup did not finish within its request timeout
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The lookup service answered, but not with a usable result
    LookupFailure {
        address: String,
        message: String,
        status_code: Option<u16>,
    },

    /// JSON decoding errors for service responses
    ParseError {
        message: String,
    },

    /// Output destination could not be created or written
    IoFailure {
        path: String,
        message: String,
    },

    /// Configuration errors (invalid settings, bad config file, etc.)
    ConfigError {
        message: String,
    },

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl GeoEnrichError {
    /// Create a new unsupported format error.
    pub fn unsupported_format<P: Into<String>>(path: P) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    /// Create a new invalid column error.
    pub fn invalid_column<C: Into<String>, R: Into<String>>(column: C, reason: R) -> Self {
        Self::InvalidColumn {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a new missing column error for a 1-based source row.
    pub fn missing_column<C: Into<String>>(row: usize, column: C) -> Self {
        Self::MissingColumn {
            row,
            column: column.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new lookup failure.
    pub fn lookup<A: Into<String>, M: Into<String>>(address: A, message: M) -> Self {
        Self::LookupFailure {
            address: address.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new lookup failure carrying the HTTP status code.
    pub fn lookup_with_status<A: Into<String>, M: Into<String>>(
        address: A,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::LookupFailure {
            address: address.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new output I/O failure.
    pub fn io_failure<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::IoFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error belongs to a single address lookup.
    ///
    /// These are absorbed into `"Error"` records and never abort a batch.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::LookupFailure { .. }
                | Self::ParseError { .. }
        )
    }

    /// Whether the service rejected the request for exceeding its quota.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::LookupFailure {
                status_code: Some(429),
                ..
            }
        )
    }
}

impl fmt::Display for GeoEnrichError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { path } => {
                write!(
                    f,
                    "Unsupported file format '{}': expected .xlsx, .xlsm or .csv",
                    path
                )
            }
            Self::InvalidColumn { column, reason } => {
                write!(f, "Invalid column '{}': {}", column, reason)
            }
            Self::MissingColumn { row, column } => {
                write!(f, "Row {} has no column {}", row, column)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::LookupFailure {
                address,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Lookup failed for '{}' (HTTP {}): {}", address, code, message)
                } else {
                    write!(f, "Lookup failed for '{}': {}", address, message)
                }
            }
            Self::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            Self::IoFailure { path, message } => {
                write!(f, "Cannot write '{}': {}", path, message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for GeoEnrichError {}

impl From<reqwest::Error> for GeoEnrichError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("Request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else if err.is_decode() {
            Self::ParseError {
                message: format!("Response body could not be decoded: {}", err),
            }
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for GeoEnrichError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
        }
    }
}

impl From<std::io::Error> for GeoEnrichError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
