//! Mock provider implementations for testing.

use super::{ClientFactory, ClientSetupError, GenerationError, GenerationResult, Part, VisionClient};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the mock client answers with.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Respond(serde_json::Value),
    Fail(GenerationError),
}

/// Spy factory: counts acquisitions and records every generation call.
pub struct MockClientFactory {
    credential: bool,
    client: Arc<MockVisionClient>,
    acquisitions: AtomicUsize,
}

impl MockClientFactory {
    pub fn new(outcome: MockOutcome) -> Self {
        Self {
            credential: true,
            client: Arc::new(MockVisionClient::new(outcome)),
            acquisitions: AtomicUsize::new(0),
        }
    }

    /// Factory that behaves as if `GEMINI_API_KEY` were unset.
    pub fn without_credential() -> Self {
        Self {
            credential: false,
            ..Self::new(MockOutcome::Respond(serde_json::Value::Null))
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn client(&self) -> &MockVisionClient {
        &self.client
    }
}

impl ClientFactory for MockClientFactory {
    fn acquire_client(&self) -> Result<Arc<dyn VisionClient>, ClientSetupError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        if !self.credential {
            return Err(ClientSetupError::MissingCredential);
        }
        Ok(self.client.clone())
    }

    fn has_credential(&self) -> bool {
        self.credential
    }
}

/// A recorded `generate_content` invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub parts: Vec<Part>,
}

/// Mock vision client for testing.
pub struct MockVisionClient {
    outcome: MockOutcome,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockVisionClient {
    pub fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl VisionClient for MockVisionClient {
    async fn generate_content(
        &self,
        model: &str,
        parts: &[Part],
    ) -> Result<GenerationResult, GenerationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: model.to_string(),
                parts: parts.to_vec(),
            });
        }

        match &self.outcome {
            MockOutcome::Respond(value) => Ok(GenerationResult(value.clone())),
            MockOutcome::Fail(err) => Err(err.clone()),
        }
    }
}
