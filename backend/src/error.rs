use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

use crate::services::TrendingError;

/// Application-level error type
#[derive(Debug)]
pub enum AppError {
    /// Period outside 1, 7, 30
    InvalidPeriod(String),
    /// Limit outside 1..=50
    InvalidLimit(String),
    /// Missing or wrong admin credentials
    Unauthorized(String),
    /// Metric source or item catalog unreachable and nothing cached
    UpstreamUnavailable(String),
    /// Internal server error
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
    meta: ErrorMeta,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorMeta {
    request_id: String,
}

impl AppError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPeriod(_) => "INVALID_PERIOD",
            Self::InvalidLimit(_) => "INVALID_LIMIT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPeriod(msg) | Self::InvalidLimit(msg) => write!(f, "{msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
            meta: ErrorMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        };

        match self {
            Self::InvalidPeriod(_) | Self::InvalidLimit(_) => {
                HttpResponse::BadRequest().json(error_response)
            }
            Self::Unauthorized(_) => HttpResponse::Unauthorized().json(error_response),
            Self::UpstreamUnavailable(_) => HttpResponse::ServiceUnavailable().json(error_response),
            Self::Internal(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<TrendingError> for AppError {
    fn from(err: TrendingError) -> Self {
        match err {
            TrendingError::InvalidPeriod(_) => Self::InvalidPeriod(err.to_string()),
            TrendingError::InvalidLimit(_) => Self::InvalidLimit(err.to_string()),
            TrendingError::Upstream(e) => {
                tracing::error!("Trending upstream failure: {}", e);
                Self::UpstreamUnavailable(
                    "Trending data is temporarily unavailable".to_string(),
                )
            }
        }
    }
}
