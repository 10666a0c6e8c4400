//! JSON envelopes shared by every route.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use redpost_core::{CoreError, ErrorExt, RedditApiError};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SuccessBody<T: Serialize> {
    success: bool,
    data: T,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorInfo {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorInfo,
    timestamp: DateTime<Utc>,
}

/// `{success: true, data, timestamp}`
#[derive(Debug)]
pub struct ApiResponse<T: Serialize>(pub T);

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            Json(SuccessBody {
                success: true,
                data: self.0,
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// `{success: false, error: {code, message, detail?}}` with a status derived
/// from the error code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        CoreError::NotFound {
            resource: resource.into(),
        }
        .into()
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        // Database errors keep their specific code so conflicts map to 409
        let code = match &error {
            CoreError::Database(e) => e.error_code(),
            _ => error.error_code(),
        };
        let status = status_for(&code);
        if status.is_server_error() {
            error.log_error();
        } else {
            error.log_warn();
        }

        // Storage internals stay in the log
        let detail = match &error {
            CoreError::Database(_) | CoreError::Io(_) | CoreError::Internal { .. } => None,
            _ => error.diagnostic_detail(),
        };

        Self {
            status,
            code,
            message: error.user_friendly_message(),
            detail,
        }
    }
}

impl From<RedditApiError> for ApiError {
    fn from(error: RedditApiError) -> Self {
        CoreError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                success: false,
                error: ErrorInfo {
                    code: self.code,
                    message: self.message,
                    detail: self.detail,
                },
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

pub fn status_for(code: &str) -> StatusCode {
    match code {
        "NOT_FOUND" | "REDDIT_ACCOUNT_NOT_FOUND" => StatusCode::NOT_FOUND,
        "INVALID_INPUT" | "REDDIT_INVALID_URL" | "REDDIT_INVALID_CREDENTIALS" | "SERIALIZATION" => {
            StatusCode::BAD_REQUEST
        }
        "DB_CONSTRAINT_VIOLATION" => StatusCode::CONFLICT,
        "REDDIT_UNAUTHORIZED" | "REDDIT_AUTH_FAILED" => StatusCode::UNAUTHORIZED,
        "REDDIT_PROVIDER_REJECTED" => StatusCode::UNPROCESSABLE_ENTITY,
        "REDDIT_RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
        "REDDIT_TIMEOUT" => StatusCode::GATEWAY_TIMEOUT,
        "REDDIT_PROXY_CONNECTION_FAILED"
        | "REDDIT_PROVIDER_ERROR"
        | "REDDIT_UNEXPECTED_RESPONSE"
        | "REDDIT_NETWORK"
        | "NETWORK" => StatusCode::BAD_GATEWAY,
        "DB_LOCKED" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
