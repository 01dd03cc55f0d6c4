use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::models::ApiResponse;

/// A single form field that could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} must be a number, got {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} value {value} is too large to score")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("{field} has malformed value {value:?}: expected {expected}")]
    Malformed {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{field} has unrecognized value {value:?}{}", suggestion_hint(.suggestion))]
    UnknownOption {
        field: &'static str,
        value: String,
        suggestion: Option<&'static str>,
    },
}

fn suggestion_hint(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean {s:?}?)"),
        None => String::new(),
    }
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field }
            | Self::NotANumber { field, .. }
            | Self::Negative { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::Malformed { field, .. }
            | Self::UnknownOption { field, .. } => field,
        }
    }
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("activity log i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Io(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let data = match &self {
            Self::Validation(err) => Some(serde_json::json!({ "field": err.field() })),
            _ => None,
        };

        let body = ApiResponse {
            status: "error".to_string(),
            message: self.to_string(),
            data,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_option_message_carries_suggestion() {
        let err = ValidationError::UnknownOption {
            field: "vehicle",
            value: "buss".to_string(),
            suggestion: Some("bus"),
        };
        assert_eq!(
            err.to_string(),
            "vehicle has unrecognized value \"buss\" (did you mean \"bus\"?)"
        );
        assert_eq!(err.field(), "vehicle");
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let missing = ApiError::from(ValidationError::Missing { field: "distance" });
        assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::NotFound("tip 9".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("joined".into()).status(), StatusCode::CONFLICT);
    }
}
