use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// A single schema violation reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required fields")]
    MissingFields,

    #[error("invalid fields")]
    Validation(Vec<FieldError>),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account temporarily locked, try again later")]
    Locked,

    #[error("account inactive")]
    Inactive,

    #[error("invalid action")]
    InvalidAction,

    #[error("malformed request body")]
    MalformedBody,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields
            | AppError::Validation(_)
            | AppError::InvalidAction
            | AppError::MalformedBody => StatusCode::BAD_REQUEST,
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Locked => StatusCode::LOCKED,
            AppError::Inactive => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => json!({
                "success": false,
                "error": self.to_string(),
                "errors": errors,
            }),
            AppError::Internal(e) => {
                error!(error = %format!("{e:#}"), "request failed");
                json!({
                    "success": false,
                    "error": self.to_string(),
                    "details": format!("{e:#}"),
                })
            }
            _ => json!({ "success": false, "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
