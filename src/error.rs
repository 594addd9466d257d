use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;

use crate::explainer::ExplainError;
use crate::models::ErrorResponse;

/// Upper bound on `max_contrib` query values
pub const MAX_CONTRIB_LIMIT: usize = 100;

/// Dashboard error types
#[derive(Debug)]
pub enum AppError {
    /// Invalid request data
    ValidationError(String),
    /// Unknown feature or row
    NotFound(String),
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ExplainError> for AppError {
    fn from(err: ExplainError) -> Self {
        match err {
            ExplainError::UnknownFeature(_) | ExplainError::UnknownId(_) => {
                AppError::NotFound(err.to_string())
            }
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_code, message) = match self {
            AppError::ValidationError(msg) => ("validation_error", msg.clone()),
            AppError::NotFound(msg) => ("not_found", msg.clone()),
            AppError::InternalError(msg) => ("internal_error", msg.clone()),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error_code.to_string(),
            message,
        })
    }
}

/// Validation functions
pub fn validate_max_contrib(max_contrib: usize) -> Result<usize, AppError> {
    if !(1..=MAX_CONTRIB_LIMIT).contains(&max_contrib) {
        return Err(AppError::ValidationError(format!(
            "max_contrib must be between 1 and {}, got {}",
            MAX_CONTRIB_LIMIT, max_contrib
        )));
    }
    Ok(max_contrib)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_max_contrib_valid() {
        assert_eq!(validate_max_contrib(1).unwrap(), 1);
        assert_eq!(validate_max_contrib(5).unwrap(), 5);
        assert!(validate_max_contrib(MAX_CONTRIB_LIMIT).is_ok());
    }

    #[test]
    fn test_validate_max_contrib_invalid() {
        assert!(validate_max_contrib(0).is_err());
        assert!(validate_max_contrib(MAX_CONTRIB_LIMIT + 1).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::ValidationError("test error".to_string());
        assert!(err.to_string().contains("Validation error"));
    }

    #[test]
    fn test_from_explain_error() {
        let err: AppError = ExplainError::UnknownId(3).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = ExplainError::NotCompiled.into();
        assert!(matches!(err, AppError::InternalError(_)));
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::ValidationError("".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InternalError("".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
