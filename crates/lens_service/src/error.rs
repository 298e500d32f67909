//! Error types for service calls, plus message extraction from error bodies.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur when talking to the local translation service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The exchange did not complete
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered with a non-success status
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Most specific message found in the body
        message: String,
    },
}

impl ServiceError {
    /// HTTP status of the failure, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Transport(_) => None,
            ServiceError::Status { status, .. } => Some(*status),
        }
    }
}

/// Generic message for a failed status when the body says nothing useful.
pub fn status_message(status: u16) -> String {
    format!("request failed ({status})")
}

/// First non-blank string among `fields` of a JSON object, trimmed.
pub fn message_field(payload: Option<&Value>, fields: &[&str]) -> Option<String> {
    let object = payload?.as_object()?;
    fields
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
