//! Gemini vision provider.
//!
//! Calls the `generateContent` REST method with inline image data and relays
//! the response body untouched.

use super::{ClientFactory, ClientSetupError, GenerationError, GenerationResult, Part, VisionClient};
use crate::config::GeminiSettings;
use crate::services::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Builds [`GeminiClient`]s from the startup configuration.
///
/// The HTTP connection pool is created on first use and shared by every
/// client handed out afterwards.
pub struct GeminiClientFactory {
    settings: GeminiSettings,
    http: OnceCell<Client>,
}

impl GeminiClientFactory {
    pub fn new(settings: GeminiSettings) -> Self {
        Self {
            settings,
            http: OnceCell::new(),
        }
    }

    fn http_client(&self) -> Result<Client, ClientSetupError> {
        self.http
            .get_or_try_init(|| {
                Client::builder()
                    .timeout(self.settings.timeout)
                    .build()
            })
            .cloned()
            .map_err(|e| ClientSetupError::Initialization(e.to_string()))
    }
}

impl ClientFactory for GeminiClientFactory {
    fn acquire_client(&self) -> Result<Arc<dyn VisionClient>, ClientSetupError> {
        let api_key = self
            .settings
            .api_key
            .as_ref()
            .ok_or(ClientSetupError::MissingCredential)?;

        let mut api_key = HeaderValue::from_str(api_key.expose_secret()).map_err(|_| {
            ClientSetupError::Initialization(
                "API key contains characters not allowed in an HTTP header".to_string(),
            )
        })?;
        api_key.set_sensitive(true);

        Ok(Arc::new(GeminiClient {
            http: self.http_client()?,
            api_base: self.settings.api_base.clone(),
            api_key,
        }))
    }

    fn has_credential(&self) -> bool {
        self.settings.api_key.is_some()
    }
}

/// Gemini client bound to one API key.
pub struct GeminiClient {
    http: Client,
    api_base: String,
    api_key: HeaderValue,
}

impl GeminiClient {
    fn api_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

#[async_trait]
impl VisionClient for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        parts: &[Part],
    ) -> Result<GenerationResult, GenerationError> {
        let request = GenerateContentRequest::new(parts);

        tracing::debug!(
            model = %model,
            parts = parts.len(),
            image_bytes = inline_bytes(parts),
            "Sending request to Gemini API"
        );

        let response = self
            .http
            .post(self.api_url(model))
            .header(API_KEY_HEADER, self.api_key.clone())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();

            let err = classify_status(status, retry_after, &body);
            tracing::warn!(
                model = %model,
                status = status.as_u16(),
                retryable = err.is_retryable(),
                "Gemini API rejected request: {}",
                err
            );
            return Err(err);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let usage = body.get("usageMetadata");
        let input_tokens = usage.and_then(|u| u["promptTokenCount"].as_u64()).unwrap_or(0);
        let output_tokens = usage.and_then(|u| u["candidatesTokenCount"].as_u64()).unwrap_or(0);
        metrics::record_tokens(model, input_tokens, output_tokens);
        tracing::info!(
            model = %model,
            input_tokens,
            output_tokens,
            "Gemini generation completed"
        );

        Ok(GenerationResult(body))
    }
}

fn inline_bytes(parts: &[Part]) -> usize {
    parts
        .iter()
        .map(|part| match part {
            Part::InlineData { data, .. } => data.len(),
            Part::Text(_) => 0,
        })
        .sum()
}

fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transport(err.to_string())
    }
}

/// Map a non-success upstream status onto the error taxonomy.
fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.chars().take(512).collect());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GenerationError::Unauthenticated(message)
        }
        // Gemini reports a bad key as INVALID_ARGUMENT with this reason.
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => {
            GenerationError::Unauthenticated(message)
        }
        StatusCode::BAD_REQUEST => GenerationError::InvalidRequest(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::QuotaExhausted {
            message,
            retry_after,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GenerationError::Timeout,
        _ => GenerationError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn new(parts: &[Part]) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: parts.iter().map(ContentPart::from).collect(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl From<&Part> for ContentPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => ContentPart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } => ContentPart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: STANDARD.encode(data),
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
