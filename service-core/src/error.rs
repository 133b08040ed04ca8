use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// HTTP-facing error for every handler in the workspace.
///
/// The `Display` of the wrapped `anyhow::Error` is the top-level context and
/// becomes the public message; the rest of the chain is only logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Method not allowed")]
    MethodNotAllowed(&'static str),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(anyhow::Error),

    #[error("Gateway timeout: {0}")]
    GatewayTimeout(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::TooManyRequests(..) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalError(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// Public message for an error chain: the outermost context only.
fn public_message(err: &anyhow::Error) -> String {
    err.to_string()
}

/// Second link of the chain. Only attached for caller-side and upstream
/// errors, where it carries no server internals.
fn upstream_detail(err: &anyhow::Error) -> Option<String> {
    err.chain().nth(1).map(|cause| cause.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let status = self.status_code();
        let mut allow = None;

        let (error_message, details, retry_after) = match self {
            AppError::BadRequest(err) => {
                tracing::debug!(error = %format!("{:#}", err), "Bad request");
                (public_message(&err), upstream_detail(&err), None)
            }
            AppError::MethodNotAllowed(allowed) => {
                allow = Some(allowed);
                ("Method not allowed".to_string(), None, None)
            }
            AppError::PayloadTooLarge(err) => (public_message(&err), None, None),
            AppError::TooManyRequests(msg, retry) => {
                tracing::warn!(retry_after = ?retry, "{}", msg);
                (msg, Some("quota exhausted".to_string()), retry)
            }
            AppError::InternalError(err) => {
                tracing::error!(error = %format!("{:#}", err), "Request failed");
                (public_message(&err), None, None)
            }
            AppError::BadGateway(err) => {
                tracing::error!(error = %format!("{:#}", err), "Upstream failure");
                (public_message(&err), upstream_detail(&err), None)
            }
            AppError::GatewayTimeout(err) => {
                tracing::error!(error = %format!("{:#}", err), "Upstream timed out");
                (public_message(&err), upstream_detail(&err), None)
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %format!("{:#}", err), "Configuration error");
                ("Configuration error".to_string(), None, None)
            }
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut().insert(header::RETRY_AFTER, retry.into());
        }

        if let Some(allowed) = allow {
            res.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allowed));
        }

        res
    }
}
