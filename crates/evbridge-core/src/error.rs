#![forbid(unsafe_code)]

//! Failures that can reach a consumer.
//!
//! A consumer never sees "consumer gone"; that condition is detected through
//! the weak consumer reference and only shows up in [`AdapterStats`] and
//! tracing output.
//!
//! [`AdapterStats`]: crate::adapter::AdapterStats

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The raw value from the source could not be read as the expected type.
    #[error("value coercion failed: expected {expected}, found {found}")]
    ValueCoercion {
        expected: &'static str,
        found: String,
    },

    /// The key path or argument the stream reads was not present.
    #[error("missing value: {key}")]
    MissingValue { key: String },

    /// A one-shot operation reported failure.
    #[error("operation failed: {reason}")]
    OperationFailed { reason: String },
}

impl BridgeError {
    #[must_use]
    pub fn coercion(expected: &'static str, found: impl Into<String>) -> Self {
        Self::ValueCoercion {
            expected,
            found: found.into(),
        }
    }

    #[must_use]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingValue { key: key.into() }
    }

    #[must_use]
    pub fn operation(reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            reason: reason.into(),
        }
    }

    /// Whether this failure came from reading or converting a value, as
    /// opposed to the source reporting a failed operation.
    #[must_use]
    pub fn is_coercion(&self) -> bool {
        matches!(self, Self::ValueCoercion { .. } | Self::MissingValue { .. })
    }
}
