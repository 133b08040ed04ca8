use crate::services::metrics;
use crate::services::providers::{GenerationError, Part};
use crate::services::PRODUCT_ANALYSIS_PROMPT;
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use service_core::error::AppError;
use service_core::middleware::RequestId;
use std::time::Instant;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

pub const READ_IMAGE_FAILED: &str = "Failed to read image";
pub const CLIENT_SETUP_FAILED: &str = "Failed to set up Gemini client";
pub const UPLOAD_FAILED: &str = "Failed to upload image";
pub const GENERATION_FAILED: &str = "Failed to generate content";
pub const ENCODE_FAILED: &str = "Failed to encode response";

/// Answers every non-POST request to `/analyze-image`.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed("POST")
}

/// `POST /analyze-image`: send the uploaded image and the product prompt to
/// the model and return its response as JSON.
///
/// The upstream call is part of this future, so a disconnecting caller
/// cancels it.
pub async fn analyze_image(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let result = analyze(&state, &request_id, multipart).await;
    let status = match &result {
        Ok(response) => response.status(),
        Err(err) => err.status_code(),
    };
    metrics::record_analysis_request(status.as_u16());
    result
}

async fn analyze(
    state: &AppState,
    request_id: &RequestId,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart
        .map_err(|e| AppError::BadRequest(anyhow::Error::new(e).context(READ_IMAGE_FAILED)))?;

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(IMAGE_FIELD) => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                return Err(AppError::BadRequest(
                    anyhow::anyhow!("no `{}` field in upload", IMAGE_FIELD)
                        .context(READ_IMAGE_FAILED),
                ))
            }
            Err(e) => return Err(multipart_error(e, READ_IMAGE_FAILED)),
        }
    };

    let client = state.clients.acquire_client().map_err(|e| {
        AppError::InternalError(anyhow::Error::new(e).context(CLIENT_SETUP_FAILED))
    })?;

    let image = field
        .bytes()
        .await
        .map_err(|e| multipart_error(e, UPLOAD_FAILED))?;

    if image.is_empty() {
        return Err(AppError::BadRequest(
            anyhow::anyhow!("uploaded image is empty").context(READ_IMAGE_FAILED),
        ));
    }

    tracing::info!(
        request_id = %request_id.0,
        model = %state.model,
        image_bytes = image.len(),
        "Analyzing uploaded image"
    );

    let parts = [Part::jpeg(image.to_vec()), Part::text(PRODUCT_ANALYSIS_PROMPT)];
    drop(image);

    let started = Instant::now();
    let generated = client.generate_content(&state.model, &parts).await;
    metrics::record_model_latency(&state.model, started.elapsed().as_secs_f64());

    let result = generated.map_err(|err| {
        metrics::record_model_error(&state.model, err.category());
        tracing::warn!(
            request_id = %request_id.0,
            model = %state.model,
            category = err.category(),
            "Model call failed"
        );
        generation_error(err)
    })?;

    let body = serde_json::to_vec(&result)
        .map_err(|e| AppError::InternalError(anyhow::Error::new(e).context(ENCODE_FAILED)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

fn multipart_error(err: MultipartError, message: &'static str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(
            anyhow::Error::new(err).context("Image exceeds upload size limit"),
        );
    }
    AppError::BadRequest(anyhow::Error::new(err).context(message))
}

/// Quota maps to 429, deadlines to 504, transport and upstream 5xx to 502,
/// rejected input to 400; credentials and anything else stay 500.
fn generation_error(err: GenerationError) -> AppError {
    match err {
        GenerationError::QuotaExhausted { retry_after, .. } => {
            AppError::TooManyRequests(GENERATION_FAILED.to_string(), retry_after)
        }
        GenerationError::InvalidRequest(_) => AppError::BadRequest(with_category(err)),
        GenerationError::Timeout => AppError::GatewayTimeout(with_category(err)),
        GenerationError::Transport(_) | GenerationError::MalformedResponse(_) => {
            AppError::BadGateway(with_category(err))
        }
        GenerationError::Upstream { status, .. } if status >= 500 => {
            AppError::BadGateway(with_category(err))
        }
        GenerationError::Unauthenticated(_) | GenerationError::Upstream { .. } => {
            AppError::InternalError(with_category(err))
        }
    }
}

fn with_category(err: GenerationError) -> anyhow::Error {
    let category = err.category();
    anyhow::Error::new(err)
        .context(category)
        .context(GENERATION_FAILED)
}
