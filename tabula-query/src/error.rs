//! Error taxonomy and the uniform error envelope.
//!
//! Internally every component returns a [`DataError`], one variant per failure
//! class. At the public boundary each error is normalized into an
//! [`ErrorEnvelope`], the only error shape callers ever see:
//!
//! ```rust
//! use tabula_query::{DataError, ErrorCode, ErrorEnvelope};
//!
//! let err = DataError::validation("title", "must not be empty");
//! let envelope = ErrorEnvelope::from(err);
//!
//! assert_eq!(envelope.code, "validation_error");
//! assert_eq!(envelope.status, 400);
//! assert!(envelope.is(ErrorCode::Validation));
//! assert_eq!(envelope.data["field"], "title");
//! ```
//!
//! # Normalizing foreign errors
//!
//! [`normalize`] accepts anything a caller or a driver may hand back and turns
//! it into an envelope. Absence of an error yields `None`:
//!
//! ```rust
//! use tabula_query::error::{normalize, RawError};
//!
//! assert!(normalize(RawError::None).is_none());
//! assert!(normalize(RawError::Driver(Some(String::new()))).is_none());
//!
//! let envelope = normalize(RawError::Message("slug is taken".into())).unwrap();
//! assert_eq!(envelope.code, "generic_error");
//! assert_eq!(envelope.status, 400);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::driver::DriverError;
use crate::hooks::HookStage;

/// Result type for the public data-access operations.
pub type DataResult<T> = Result<T, ErrorEnvelope>;

/// Stable error codes carried by every [`ErrorEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Missing or invalid input.
    Validation,
    /// Rejected by the raw-query gate or another safety policy.
    SecurityRejection,
    /// An upsert probe matched more than one row.
    DuplicateConflict,
    /// The underlying driver reported a failure.
    Driver,
    /// A lifecycle hook reported a failure.
    Hook,
    /// A lease-protected operation outlived its lease.
    LeaseExpired,
    /// The layer was composed with an invalid configuration.
    Configuration,
    /// A string-only error with no further structure.
    Generic,
}

impl ErrorCode {
    /// Get the wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::SecurityRejection => "security_rejection",
            Self::DuplicateConflict => "duplicate_conflict",
            Self::Driver => "driver_error",
            Self::Hook => "hook_error",
            Self::LeaseExpired => "lease_expired",
            Self::Configuration => "configuration_error",
            Self::Generic => "generic_error",
        }
    }

    /// Status attached to envelopes of this code unless the source specifies one.
    pub fn default_status(&self) -> u16 {
        match self {
            Self::Validation | Self::Hook | Self::Generic => 400,
            Self::SecurityRejection => 403,
            Self::DuplicateConflict | Self::LeaseExpired => 409,
            Self::Driver | Self::Configuration => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised inside the data-access layer.
#[derive(Error, Debug)]
pub enum DataError {
    /// Missing or invalid required field.
    #[error("invalid value for {field}: {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The raw-query gate (or a column requirement) refused the request.
    #[error("rejected by safety policy: {0}")]
    SecurityRejection(String),

    /// An upsert match condition selected more than one row.
    #[error("ambiguous match on {table}: {matches} rows selected")]
    DuplicateConflict {
        /// Table the probe ran against.
        table: String,
        /// How many rows matched (capped by the probe).
        matches: usize,
    },

    /// Wrapped driver failure.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// A registered callback reported failure.
    #[error("{stage} hook failed on {table}: {}", .envelope.message)]
    Hook {
        /// Table the hook ran for.
        table: String,
        /// Stage that failed.
        stage: HookStage,
        /// What the callback reported.
        envelope: ErrorEnvelope,
    },

    /// A lease-protected operation outlived its lease.
    #[error("lease {key} expired before the operation completed")]
    LeaseExpired {
        /// The lease key.
        key: String,
    },

    /// Invalid composition of the layer.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl DataError {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a security rejection.
    pub fn security(message: impl Into<String>) -> Self {
        Self::SecurityRejection(message.into())
    }

    /// Get the code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::Validation,
            Self::SecurityRejection(_) => ErrorCode::SecurityRejection,
            Self::DuplicateConflict { .. } => ErrorCode::DuplicateConflict,
            Self::Driver(_) => ErrorCode::Driver,
            Self::Hook { .. } => ErrorCode::Hook,
            Self::LeaseExpired { .. } => ErrorCode::LeaseExpired,
            Self::Configuration(_) => ErrorCode::Configuration,
        }
    }
}

/// The uniform `{code, message, status, data}` error shape.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ErrorEnvelope {
    /// Stable error code.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// HTTP-like status.
    pub status: u16,
    /// Additional structured detail.
    #[serde(default)]
    pub data: Map<String, JsonValue>,
}

impl ErrorEnvelope {
    /// Create an envelope with the code's default status.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
            status: code.default_status(),
            data: Map::new(),
        }
    }

    /// Create an envelope with a caller-defined code.
    ///
    /// Hooks use this to report domain failures such as `"missing_title"`.
    pub fn custom(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: 400,
            data: Map::new(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Attach a data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Check whether this envelope carries the given code.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code.as_str()
    }
}

impl From<DataError> for ErrorEnvelope {
    fn from(err: DataError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            DataError::Validation { field, .. } => {
                ErrorEnvelope::new(code, message).with_data("field", field)
            }
            DataError::DuplicateConflict { table, matches } => ErrorEnvelope::new(code, message)
                .with_data("table", table)
                .with_data("matches", matches),
            DataError::Driver(driver) => {
                let envelope = ErrorEnvelope::new(code, message);
                match driver.sql {
                    Some(sql) => envelope.with_data("sql", sql),
                    None => envelope,
                }
            }
            // Hooks speak envelopes already; keep what they reported.
            DataError::Hook {
                table,
                stage,
                mut envelope,
            } => {
                if envelope.code.is_empty() {
                    envelope.code = code.as_str().to_string();
                }
                envelope
                    .with_data("table", table)
                    .with_data("hook_stage", stage.as_str())
            }
            DataError::LeaseExpired { key } => {
                ErrorEnvelope::new(code, message).with_data("lease", key)
            }
            DataError::SecurityRejection(_) | DataError::Configuration(_) => {
                ErrorEnvelope::new(code, message)
            }
        }
    }
}

impl From<DriverError> for ErrorEnvelope {
    fn from(err: DriverError) -> Self {
        DataError::from(err).into()
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Anything that may or may not describe a failure.
#[derive(Debug)]
pub enum RawError {
    /// No error occurred.
    None,
    /// A bare message.
    Message(String),
    /// A structured error that may carry its own code and status.
    Structured {
        /// Caller-defined code.
        code: Option<String>,
        /// Message.
        message: String,
        /// Caller-defined status.
        status: Option<u16>,
        /// Extra detail.
        data: Map<String, JsonValue>,
    },
    /// The driver's "last error" signal; empty means success.
    Driver(Option<String>),
    /// An internal error.
    Data(DataError),
}

impl From<DataError> for RawError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

/// Convert any raw error signal into an envelope.
///
/// Returns `None` when `raw` describes success, letting values pass through.
pub fn normalize(raw: impl Into<RawError>) -> Option<ErrorEnvelope> {
    match raw.into() {
        RawError::None => None,
        RawError::Message(message) => Some(ErrorEnvelope::new(ErrorCode::Generic, message)),
        RawError::Structured {
            code,
            message,
            status,
            data,
        } => {
            let code = code
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| ErrorCode::Generic.as_str().to_string());
            Some(ErrorEnvelope {
                code,
                message,
                status: status.unwrap_or(400),
                data,
            })
        }
        RawError::Driver(last_error) => last_error
            .filter(|e| !e.trim().is_empty())
            .map(|e| ErrorEnvelope::new(ErrorCode::Driver, e)),
        RawError::Data(err) => Some(err.into()),
    }
}
