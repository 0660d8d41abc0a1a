//! Errors raised at the mediator boundary

use conduit_events::HandlerError;
use conduit_validation::ValidationErrors;
use serde::Serialize;
use std::collections::BTreeMap;

/// Uniform client-error shape returned by the mediator.
///
/// Renders as `{ "statusCode", "message", "errors"? }`.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{status_code} {message}")]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL: u16 = 500;

    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            errors: None,
        }
    }

    /// Validation failure with its field to messages map
    pub fn validation(errors: &ValidationErrors) -> Self {
        Self {
            status_code: Self::BAD_REQUEST,
            message: "Validation failed".to_string(),
            errors: Some(errors.to_field_map()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Self::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL, message)
    }

    /// Client errors are never worth retrying
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(&errors)
    }
}

impl From<HandlerError> for ApiError {
    fn from(error: HandlerError) -> Self {
        match error {
            HandlerError::NotFound(what) => Self::not_found(what),
            HandlerError::Decode(e) => Self::bad_request(format!("Malformed request: {}", e)),
            other => Self::internal(other.to_string()),
        }
    }
}

/// Registration table errors, fatal at startup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate command handler for {0}")]
    DuplicateCommand(String),

    #[error("Duplicate query handler for {0}")]
    DuplicateQuery(String),
}
