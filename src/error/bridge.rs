use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error as ThisError;

use super::{IsRetryable, OauthError};
use crate::utils::logging::preview;
use codex_bridge_schema::ChatErrorBody;

/// Characters of an upstream body kept for logs and error previews.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, ThisError)]
pub enum BridgeError {
    /// The credential record is missing; the user has to log in with the CLI first.
    #[error("credential file not found at {}", path.display())]
    AuthFileNotFound { path: PathBuf },

    /// The record or its access token is malformed, or the account claim is absent.
    #[error("invalid credential: {0}")]
    AuthToken(String),

    #[error("token refresh failed: {0}")]
    AuthRefresh(#[from] OauthError),

    #[error("invalid request payload: {0}")]
    PayloadValidation(String),

    /// Non-success status from the backend, with its rate-limit metadata.
    #[error("backend returned {status}: {message}")]
    BackendHttp {
        status: StatusCode,
        message: String,
        retry_after: Option<u64>,
        rate_limit: BTreeMap<String, String>,
        body: String,
    },

    /// The backend reported a failure inside an otherwise successful stream.
    #[error("backend stream error: {0}")]
    BackendStream(String),

    /// Every parse strategy failed. `raw` holds a preview of what was received.
    #[error("unable to parse backend response: {reason}")]
    ResponseParse { reason: String, raw: String },

    /// No response headers from the backend within the request timeout.
    #[error("backend did not respond within {}s", .0.as_secs())]
    BackendTimeout(Duration),

    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub(crate) fn response_parse(reason: impl Into<String>, raw: &str) -> Self {
        BridgeError::ResponseParse {
            reason: reason.into(),
            raw: preview(raw, UPSTREAM_BODY_PREVIEW_CHARS),
        }
    }

    /// HTTP status the front end answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::AuthFileNotFound { .. }
            | BridgeError::AuthToken(_)
            | BridgeError::AuthRefresh(_) => StatusCode::UNAUTHORIZED,
            BridgeError::PayloadValidation(_) => StatusCode::BAD_REQUEST,
            BridgeError::BackendHttp { status, .. } => *status,
            BridgeError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::BackendStream(_)
            | BridgeError::ResponseParse { .. }
            | BridgeError::Transport(_) => StatusCode::BAD_GATEWAY,
            BridgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            BridgeError::AuthFileNotFound { .. } => "AUTH_FILE_NOT_FOUND",
            BridgeError::AuthToken(_) => "AUTH_TOKEN_INVALID",
            BridgeError::AuthRefresh(_) => "AUTH_REFRESH_FAILED",
            BridgeError::PayloadValidation(_) => "INVALID_REQUEST",
            BridgeError::BackendHttp { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS => {
                "RATE_LIMITED"
            }
            BridgeError::BackendHttp { .. } | BridgeError::BackendStream(_) => "UPSTREAM_ERROR",
            BridgeError::ResponseParse { .. } => "UPSTREAM_PARSE_ERROR",
            BridgeError::BackendTimeout(_) => "UPSTREAM_TIMEOUT",
            BridgeError::Transport(_) => "UPSTREAM_UNREACHABLE",
            BridgeError::Io(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for BridgeError {
    fn from(rejection: JsonRejection) -> Self {
        BridgeError::PayloadValidation(rejection.body_text())
    }
}

impl IsRetryable for BridgeError {
    fn is_retryable(&self) -> bool {
        match self {
            BridgeError::BackendHttp { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            BridgeError::BackendTimeout(_) | BridgeError::Transport(_) => true,
            BridgeError::AuthRefresh(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let retry_after = match &self {
            BridgeError::BackendHttp { retry_after, .. } => *retry_after,
            _ => None,
        };

        let message = match &self {
            BridgeError::BackendHttp { message, body, .. } => {
                tracing::warn!(
                    status = %status,
                    message = %message,
                    raw_body = %preview(body, UPSTREAM_BODY_PREVIEW_CHARS),
                    "Backend HTTP error"
                );
                message.clone()
            }
            BridgeError::ResponseParse { reason, raw } => {
                tracing::warn!(reason = %reason, raw = %raw, "Backend response parse error");
                self.to_string()
            }
            BridgeError::Io(e) => {
                tracing::error!(error = %e, "Internal I/O error");
                "An internal server error occurred.".to_string()
            }
            other => {
                tracing::warn!(status = %status, code, error = %other, "Request failed");
                other.to_string()
            }
        };

        let body = ChatErrorBody::new(error_type(status), message).with_code(code);
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

fn error_type(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "authentication_error",
        StatusCode::TOO_MANY_REQUESTS => "rate_limit_error",
        s if s.is_client_error() => "invalid_request_error",
        _ => "api_error",
    }
}
