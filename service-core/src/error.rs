use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy shared by every service in the platform.
///
/// Each variant maps to an HTTP status and a stable machine-usable `code`
/// in the response body. Unexpected failures are logged with request
/// context and surfaced as a generic internal error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Invalid state: {0}")]
    InvalidState(anyhow::Error),

    #[error("Invalid amount: {0}")]
    InvalidAmount(anyhow::Error),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Amount mismatch: claimed {claimed}, confirmed {confirmed}")]
    AmountMismatch { claimed: f64, confirmed: f64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl AppError {
    /// Stable machine-usable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::ExtractionFailed(_) => "EXTRACTION_FAILED",
            AppError::VerificationFailed(_) => "VERIFICATION_FAILED",
            AppError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let code = self.code();
        let (status, error_message, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None),
            AppError::InvalidState(err) => (StatusCode::CONFLICT, err.to_string(), None),
            AppError::InvalidAmount(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            AppError::ProviderUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            // Deliberately terse: reveal nothing about why verification failed.
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "Invalid signature".to_string(),
                None,
            ),
            AppError::ExtractionFailed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
            AppError::VerificationFailed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
            AppError::AmountMismatch { claimed, confirmed } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Claimed amount does not match the verified amount".to_string(),
                Some(format!("claimed {:.2}, confirmed {:.2}", claimed, confirmed)),
            ),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string(), None),
            AppError::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string(), None),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                code,
                details,
            }),
        )
            .into_response()
    }
}
