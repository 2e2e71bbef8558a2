use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

use crate::config::RuntimeMode;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// A query did not finish within the configured per-query timeout.
    QueryTimeout(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::QueryTimeout(msg) => write!(f, "Query timed out: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    fn kind(&self) -> &'static str {
        match self.root() {
            AppError::DatabaseError(_) => "database",
            AppError::QueryTimeout(_) => "timeout",
            AppError::ExternalApiError(_) => "external_api",
            AppError::WithContext { .. } => "internal",
        }
    }

    /// Driver error code, when the database reported one.
    fn code(&self) -> Option<String> {
        match self.root() {
            AppError::DatabaseError(sqlx::Error::Database(db)) => {
                db.code().map(|c| c.into_owned())
            }
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

/// Uniform JSON body returned on failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// User-facing description of the failed operation.
    pub error: String,
    /// Only present outside production.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetails {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// An `AppError` bound to the endpoint that failed.
///
/// Every failure leaves the API as `500` with the same envelope; the
/// underlying error only appears under `details` in development mode.
#[derive(Debug)]
pub struct ApiFailure {
    pub message: &'static str,
    pub error: AppError,
    pub mode: RuntimeMode,
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        tracing::error!("API error: {} -> {}", self.message, self.error);

        let details = self.mode.exposes_error_details().then(|| ErrorDetails {
            kind: self.error.kind().to_string(),
            message: self.error.to_string(),
            code: self.error.code(),
        });

        let body = ErrorBody {
            error: self.message.to_string(),
            details,
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(AppError::from).context(context)
    }
}

/// Binds a query-layer result to the failing endpoint's message.
pub trait ApiResultExt<T> {
    fn or_api_failure(self, message: &'static str, mode: RuntimeMode) -> Result<T, ApiFailure>;
}

impl<T> ApiResultExt<T> for Result<T, AppError> {
    fn or_api_failure(self, message: &'static str, mode: RuntimeMode) -> Result<T, ApiFailure> {
        self.map_err(|error| ApiFailure {
            message,
            error,
            mode,
        })
    }
}
