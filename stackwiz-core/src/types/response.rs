//! Uniform operation result envelope

use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, ErrorCategory};

/// Structured error carried by a failed [`OperationResult`]
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&CoreError> for ErrorPayload {
    fn from(error: &CoreError) -> Self {
        let details = serde_json::to_value(error)
            .ok()
            .and_then(|mut v| v.get_mut("details").map(Value::take));

        // Provider errors carry their own variant tag; surface it instead of the wrapper's
        let code = match (error, &details) {
            (CoreError::Provider(_), Some(inner)) => inner
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_else(|| error.code())
                .to_string(),
            _ => error.code().to_string(),
        };

        Self {
            code,
            category: error.category(),
            message: error.to_string(),
            details,
        }
    }
}

/// `{success, message, details?, error?}` returned by every operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details,
            error: None,
        }
    }

    /// Success with a serializable payload; a payload that fails to serialize is dropped
    pub fn success_with<T: Serialize>(message: impl Into<String>, details: &T) -> Self {
        Self::success(message, serde_json::to_value(details).ok())
    }

    pub fn failure(error: &CoreError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            details: None,
            error: Some(ErrorPayload::from(error)),
        }
    }

    /// Failure that still carries a payload (partial success)
    pub fn failure_with<T: Serialize>(
        message: impl Into<String>,
        details: &T,
        error: Option<ErrorPayload>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: serde_json::to_value(details).ok(),
            error,
        }
    }
}
