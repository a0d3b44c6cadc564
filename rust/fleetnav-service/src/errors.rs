use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fleetnav_core::NavError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NoRoute(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorPayload<'a>,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    code: &'a str,
    message: String,
}

impl From<NavError> for AppError {
    fn from(e: NavError) -> Self {
        match e {
            NavError::InvalidInput(msg) => AppError::BadRequest(msg),
            NavError::NotFound(_) => AppError::NotFound(e.to_string()),
            NavError::NoRouteFound { .. } => AppError::NoRoute(e.to_string()),
            NavError::AlreadyNavigating(_) => AppError::Conflict(e.to_string()),
            NavError::Storage(_) | NavError::Encoding(_) => AppError::Internal(e.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(r: JsonRejection) -> Self {
        AppError::BadRequest(r.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(r: QueryRejection) -> Self {
        AppError::BadRequest(r.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::NoRoute(_) => (StatusCode::NOT_FOUND, "no_route"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "already_navigating"),
            AppError::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        let message = match self {
            AppError::BadRequest(msg) => msg,
            other => other.to_string(),
        };
        let body = ErrorBody { error: ErrorPayload { code, message } };
        (status, Json(body)).into_response()
    }
}
