//! Gateway error types and their HTTP mapping.
//!
//! Every failure the gateway itself produces is rendered as an OpenAI-style
//! error body. Upstream error replies are not errors here: they are
//! forwarded verbatim by the forwarding layer.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use deepgate_core::TranslateError;

/// Terminal failure for one inbound request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or wrong bearer credential.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The client asked for a model the gateway does not serve.
    #[error("Model {requested} not supported. Use {accepted} instead.")]
    UnsupportedModel { requested: String, accepted: String },

    /// Unreadable or unparseable inbound body.
    #[error("{0}")]
    BadRequest(String),

    /// Path outside the accepted API prefix.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure reaching the upstream.
    #[error("Error forwarding request: {0}")]
    UpstreamUnreachable(String),

    /// The upstream success body could not be read to the end.
    #[error("Error reading response from upstream: {0}")]
    UpstreamBodyRead(String),

    /// The upstream success body did not have the expected shape.
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamBody(String),

    /// Building or re-encoding a payload failed.
    #[error("Internal translation error: {0}")]
    InternalTranslation(String),
}

impl GatewayError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::UnsupportedModel { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamBodyRead(_)
            | Self::MalformedUpstreamBody(_)
            | Self::InternalTranslation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn kind(&self) -> (&'static str, &'static str) {
        match self {
            Self::Unauthorized(_) => ("authentication_error", "invalid_api_key"),
            Self::UnsupportedModel { .. } => ("invalid_request_error", "model_not_found"),
            Self::BadRequest(_) => ("invalid_request_error", "invalid_request"),
            Self::NotFound(_) => ("invalid_request_error", "not_found"),
            Self::UpstreamUnreachable(_) => ("server_error", "upstream_unreachable"),
            Self::UpstreamBodyRead(_) => ("server_error", "upstream_read_failed"),
            Self::MalformedUpstreamBody(_) => ("server_error", "malformed_upstream_body"),
            Self::InternalTranslation(_) => ("server_error", "internal_error"),
        }
    }
}

impl From<TranslateError> for GatewayError {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::UnsupportedModel {
                requested,
                accepted,
            } => Self::UnsupportedModel {
                requested,
                accepted,
            },
            TranslateError::MalformedUpstreamBody(msg) => Self::MalformedUpstreamBody(msg),
            TranslateError::Serialization(msg) => Self::InternalTranslation(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, code) = self.kind();
        let body = ErrorResponse::with_code(self.to_string(), error_type, code);

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Error response matching OpenAI format.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail within an error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    /// Create an error response with a code.
    pub fn with_code(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                r#type: error_type.into(),
                code: Some(code.into()),
            },
        }
    }
}
