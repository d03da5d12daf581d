use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for both endpoints. Every variant maps to a fixed
/// status code and a machine-stable error code; internal causes are logged
/// and never leak into the response body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Email domain does not exist")]
    InvalidEmailDomain,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// Covers both unknown email and wrong password; callers must not be
    /// able to tell the two apart.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0} did not respond in time")]
    UpstreamTimeout(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidEmailDomain => StatusCode::BAD_REQUEST,
            ApiError::EmailAlreadyRegistered => StatusCode::CONFLICT,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::InvalidEmailDomain => "invalid_email_domain",
            ApiError::EmailAlreadyRegistered => "email_already_registered",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::UpstreamTimeout(_) => "upstream_timeout",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let detail = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: code, detail })).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => ApiError::UpstreamTimeout("database"),
            sqlx::Error::Database(db_err) => {
                // The unique constraint on users.email is the authoritative
                // arbiter of concurrent registrations; report a violation as
                // the same conflict the application-level pre-check produces.
                if db_err.is_unique_violation()
                    && db_err.constraint().map_or(false, |c| c.contains("email"))
                {
                    ApiError::EmailAlreadyRegistered
                } else {
                    ApiError::Internal(sqlx::Error::Database(db_err).into())
                }
            }
            other => ApiError::Internal(other.into()),
        }
    }
}
