/// JSON response envelope shared by every endpoint
use crate::validation::FieldErrors;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// `{status, data?, validationError?, errorMsg?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T = serde_json::Value> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl<T> Envelope<T> {
    /// Successful response carrying a payload
    pub fn ok(data: T) -> Self {
        Self {
            status: true,
            data: Some(data),
            validation_error: None,
            error_msg: None,
        }
    }
}

impl Envelope {
    /// Successful response without a payload
    pub fn empty() -> Self {
        Self {
            status: true,
            data: None,
            validation_error: None,
            error_msg: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            data: None,
            validation_error: None,
            error_msg: Some(message.into()),
        }
    }

    pub fn validation(fields: FieldErrors) -> Self {
        Self {
            status: false,
            data: None,
            validation_error: Some(fields),
            error_msg: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
