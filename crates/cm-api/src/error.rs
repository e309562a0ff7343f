use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{borrow::Cow, future::Future};
use thiserror::Error;
use tracing::{error, warn};

use cm_common::gateway::{FieldError, GatewayError, ValidationErrors};

tokio::task_local! {
    static REQUEST_ID: String;
}

fn sanitize_message(message: &str) -> String {
    const MAX_LEN: usize = 240;

    let cleaned = message
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace(['\n', '\r'], " ");

    let mut cleaned = cleaned
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]".to_string()
            } else if let Some((base, _)) = token.split_once('?') {
                if base.is_empty() {
                    "[redacted-query]".to_string()
                } else {
                    format!("{base}?[redacted]")
                }
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]".to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() > MAX_LEN {
        cleaned = cleaned.chars().take(MAX_LEN).collect();
        cleaned.push('…');
    }

    if cleaned.trim().is_empty() {
        "unexpected error".to_string()
    } else {
        cleaned
    }
}

pub async fn with_request_id<Fut, T>(request_id: Option<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    if let Some(request_id) = request_id {
        REQUEST_ID.scope(request_id, fut).await
    } else {
        fut.await
    }
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|value| value.clone()).ok()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("unknown engine {requested:?}")]
    UnknownEngine {
        requested: String,
        available: Vec<String>,
    },
    #[error("engine {engine} timed out after {timeout_ms}ms")]
    EngineTimeout { engine: String, timeout_ms: u64 },
    #[error("engine {engine} failed: {message}")]
    EngineFailed { engine: String, message: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let request_id = current_request_id();

        if status.is_server_error() {
            error!(
                code,
                status = %status,
                request_id = request_id.as_deref().unwrap_or(""),
                error = %self,
                "api_error"
            );
        } else {
            warn!(
                code,
                status = %status,
                request_id = request_id.as_deref().unwrap_or(""),
                error = %self,
                "api_error"
            );
        }

        let message = self.public_message().into_owned();
        let (details, available, engine) = match self {
            ApiError::Validation(errors) => (Some(errors.errors), None, None),
            ApiError::UnknownEngine { available, .. } => (None, Some(available), None),
            ApiError::EngineTimeout { engine, .. } | ApiError::EngineFailed { engine, .. } => {
                (None, None, Some(engine))
            }
            _ => (None, None, None),
        };

        let body = Json(ErrorResponse {
            code,
            message,
            request_id,
            details,
            available,
            engine,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::UnknownEngine { .. } => "unknown_engine",
            ApiError::EngineTimeout { .. } => "engine_timeout",
            ApiError::EngineFailed { .. } => "engine_error",
            ApiError::Config(_) => "config_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::BadRequest(msg) => Cow::Owned(sanitize_message(msg)),
            ApiError::Validation(errors) => Cow::Owned(sanitize_message(&errors.to_string())),
            ApiError::UnknownEngine { requested, available } => Cow::Owned(sanitize_message(&format!(
                "unknown engine {requested:?}; available: {}",
                available.join(", ")
            ))),
            ApiError::EngineTimeout { engine, timeout_ms } => Cow::Owned(format!(
                "engine {engine} did not respond within {timeout_ms}ms"
            )),
            ApiError::EngineFailed { engine, message } => {
                Cow::Owned(sanitize_message(&format!("engine {engine} failed: {message}")))
            }
            ApiError::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            ApiError::Config(_) | ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) | ApiError::UnknownEngine { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::EngineTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::EngineFailed { .. } => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Config(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Validation(errors) => ApiError::Validation(errors),
            GatewayError::UnknownEngine {
                requested,
                available,
            } => ApiError::UnknownEngine {
                requested,
                available,
            },
            GatewayError::EngineTimeout { engine, timeout_ms } => {
                ApiError::EngineTimeout { engine, timeout_ms }
            }
            GatewayError::EngineExecution { engine, message } => {
                ApiError::EngineFailed { engine, message }
            }
            GatewayError::NoEngines => ApiError::ServiceUnavailable("no_engines".into()),
        }
    }
}
