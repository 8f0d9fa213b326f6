//! Error envelope shared by handlers and middleware.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use topicwatch_db::DbError;

use super::ResponseMeta;

/// Machine-readable error kind. Serialized into `error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    ValidationError,
    RateLimited,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The row a `not_found` error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    User,
    Topic,
    Subscription,
}

impl Missing {
    fn message(self) -> &'static str {
        match self {
            Missing::User => "user not found",
            Missing::Topic => "topic not found",
            Missing::Subscription => "subscription not found",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(request_id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub fn not_found(request_id: impl Into<String>, missing: Missing) -> Self {
        Self::new(request_id, ErrorCode::NotFound, missing.message())
    }

    pub fn validation(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(request_id, ErrorCode::ValidationError, message)
    }

    /// Maps a store failure. `NotFound` and foreign-key violations both
    /// report `missing`; validation failures keep their own message.
    pub fn from_db(request_id: impl Into<String>, missing: Missing, error: &DbError) -> Self {
        match error {
            DbError::NotFound => Self::not_found(request_id, missing),
            DbError::Sqlx(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Self::not_found(request_id, missing)
            }
            DbError::InvalidTopicName(_) | DbError::InvalidPostUrl => {
                Self::validation(request_id, error.to_string())
            }
            _ => {
                tracing::error!(error = %error, "api: database query failed");
                Self::new(request_id, ErrorCode::InternalError, "database query failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.error.code.status(), Json(self)).into_response()
    }
}
