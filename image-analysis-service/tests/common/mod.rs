#![allow(dead_code)]

use image_analysis_service::config::{AnalysisConfig, GeminiSettings, UploadConfig};
use image_analysis_service::services::ClientFactory;
use image_analysis_service::startup::Application;
use reqwest::multipart;
use secrecy::SecretString;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_MODEL: &str = "gemini-1.5-pro";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
}

/// Configuration bound to a random local port; nothing is read from the environment.
pub fn test_config(api_base: &str, api_key: Option<&str>) -> AnalysisConfig {
    AnalysisConfig {
        common: CoreConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        gemini: GeminiSettings {
            api_key: api_key.map(|k| SecretString::new(k.to_string())),
            model: TEST_MODEL.to_string(),
            api_base: api_base.to_string(),
            timeout: Duration::from_secs(5),
        },
        upload: UploadConfig {
            max_bytes: 1024 * 1024,
        },
    }
}

impl TestApp {
    /// Spawn with the real Gemini client factory.
    pub async fn spawn(config: AnalysisConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    /// Spawn with an injected client factory.
    pub async fn spawn_with_factory(config: AnalysisConfig, clients: Arc<dyn ClientFactory>) -> Self {
        let app = Application::with_client_factory(config, clients)
            .await
            .expect("Failed to build test application");
        Self::start(app).await
    }

    async fn start(app: Application) -> Self {
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub fn analyze_url(&self) -> String {
        format!("{}/analyze-image", self.address)
    }

    pub async fn post_form(&self, form: multipart::Form) -> reqwest::Response {
        self.client
            .post(self.analyze_url())
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_image(&self, bytes: Vec<u8>) -> reqwest::Response {
        self.post_form(image_form(bytes)).await
    }
}

pub fn image_form(bytes: Vec<u8>) -> multipart::Form {
    multipart::Form::new().part(
        "image",
        multipart::Part::bytes(bytes)
            .file_name("shelf.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    )
}

/// Minimal JPEG-looking payload (SOI, APP0 header, EOI).
pub fn sample_jpeg() -> Vec<u8> {
    vec![
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
    ]
}

/// A generateContent response shaped like Gemini's.
pub fn sample_generation() -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{
                    "text": "[{\"name\":\"Trail Running Shoe\",\"desc\":\"Lightweight shoe for off-road running.\",\"similar_products\":[\"Speedgoat 5\",\"Peregrine 13\"]}]"
                }]
            },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {
            "promptTokenCount": 412,
            "candidatesTokenCount": 58,
            "totalTokenCount": 470
        },
        "modelVersion": "gemini-1.5-pro-002"
    })
}

pub async fn error_body(response: reqwest::Response) -> serde_json::Value {
    response.json().await.expect("Failed to parse JSON")
}
