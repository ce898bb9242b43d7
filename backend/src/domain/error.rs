//! Domain-level error types.
//!
//! These errors are transport agnostic. Whatever sits in front of the domain
//! (an RPC boundary, a CLI, a presentation layer) maps them to its own
//! envelope; the `code` is the stable contract, the message is for humans.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A backing store could not be reached. Callers retry with backoff.
    StoreUnavailable,
    /// The requested entity does not exist.
    NotFound,
    /// The write lost a race or would break an ordering rule.
    Conflict,
    /// Stored data contradicts a domain invariant.
    IntegrityViolation,
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Whether a caller may retry the same request unchanged.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }

    const fn fallback_message(self) -> &'static str {
        match self {
            Self::StoreUnavailable => "store unavailable",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::IntegrityViolation => "integrity violation",
            Self::InvalidRequest => "invalid request",
            Self::InternalError => "internal error",
        }
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
///
/// # Examples
/// ```
/// use mutuelle_sync::domain::{DomainError, ErrorCode};
///
/// let err = DomainError::not_found("prescription", "42");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "DomainErrorDto", into = "DomainErrorDto")]
pub struct DomainError {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainErrorValidationError {
    /// The message was empty or whitespace only.
    EmptyMessage,
}

impl fmt::Display for DomainErrorValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "error message must not be empty"),
        }
    }
}

impl std::error::Error for DomainErrorValidationError {}

impl DomainError {
    /// Create a new error. Blank messages fall back to the code's default.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::try_new(code, message).unwrap_or_else(|_| Self {
            code,
            message: code.fallback_message().to_owned(),
            details: None,
        })
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, DomainErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(DomainErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Stable machine-readable error code.
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Supplementary structured details.
    pub const fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use mutuelle_sync::domain::{DomainError, ErrorCode};
    /// use serde_json::json;
    ///
    /// let err = DomainError::new(ErrorCode::InvalidRequest, "bad")
    ///     .with_details(json!({ "field": "amount" }));
    /// assert!(err.details().is_some());
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A backing store could not be reached.
    ///
    /// The store name is kept in `details.store` so callers can decide which
    /// dependency to wait for.
    pub fn store_unavailable(store: impl Into<String>) -> Self {
        let store = store.into();
        Self::new(ErrorCode::StoreUnavailable, format!("{store} store is unavailable"))
            .with_details(json!({ "store": store }))
    }

    /// The entity `entity` with identifier `id` does not exist.
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        let entity = entity.into();
        let id = id.to_string();
        Self::new(ErrorCode::NotFound, format!("{entity} {id} not found"))
            .with_details(json!({ "entity": entity, "id": id }))
    }

    /// A write was refused because it would break an ordering rule.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, format!("conflict: {}", reason.into()))
    }

    /// Stored data contradicts a domain invariant.
    pub fn integrity_violation(detail: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::IntegrityViolation,
            format!("integrity violation: {}", detail.into()),
        )
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Name of the unavailable store, when this is a store outage.
    pub fn unavailable_store(&self) -> Option<&str> {
        if self.code != ErrorCode::StoreUnavailable {
            return None;
        }
        self.details
            .as_ref()
            .and_then(|details| details.get("store"))
            .and_then(Value::as_str)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DomainError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<DomainError> for DomainErrorDto {
    fn from(value: DomainError) -> Self {
        Self {
            code: value.code,
            message: value.message,
            details: value.details,
        }
    }
}

impl TryFrom<DomainErrorDto> for DomainError {
    type Error = DomainErrorValidationError;

    fn try_from(value: DomainErrorDto) -> Result<Self, Self::Error> {
        let DomainErrorDto {
            code,
            message,
            details,
        } = value;

        let mut error = Self::try_new(code, message)?;
        error.details = details;
        Ok(error)
    }
}
