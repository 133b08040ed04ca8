//! Application startup and lifecycle management.

use crate::config::{AnalysisConfig, UploadConfig};
use crate::handlers;
use crate::services::{init_metrics, ClientFactory, GeminiClientFactory};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::middleware::request_id_middleware;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use service_core::tower_http::trace::TraceLayer;

/// Shared, read-only application state.
#[derive(Clone)]
pub struct AppState {
    pub clients: Arc<dyn ClientFactory>,
    pub model: Arc<String>,
}

/// Build the HTTP router. Exposed separately so tests can drive it in-process.
pub fn router(state: AppState, upload: &UploadConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/analyze-image",
            post(handlers::analyze_image).fallback(handlers::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(upload.max_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the Gemini backend.
    pub async fn build(config: AnalysisConfig) -> Result<Self, AppError> {
        let AnalysisConfig {
            common,
            gemini,
            upload,
        } = config;

        if gemini.api_key.is_none() {
            tracing::warn!(
                "GEMINI_API_KEY is not set; analysis requests will fail until it is configured"
            );
        }

        tracing::info!(
            model = %gemini.model,
            api_base = %gemini.api_base,
            timeout_secs = gemini.timeout.as_secs(),
            "Initialized Gemini client factory"
        );

        let model = gemini.model.clone();
        let clients: Arc<dyn ClientFactory> = Arc::new(GeminiClientFactory::new(gemini));

        Self::bind(common, &upload, model, clients).await
    }

    /// Build the application around an arbitrary client factory.
    pub async fn with_client_factory(
        config: AnalysisConfig,
        clients: Arc<dyn ClientFactory>,
    ) -> Result<Self, AppError> {
        Self::bind(config.common, &config.upload, config.gemini.model, clients).await
    }

    async fn bind(
        common: core_config::Config,
        upload: &UploadConfig,
        model: String,
        clients: Arc<dyn ClientFactory>,
    ) -> Result<Self, AppError> {
        init_metrics().map_err(|e| {
            AppError::ConfigError(anyhow::Error::new(e).context("Failed to initialize metrics"))
        })?;

        let state = AppState {
            clients,
            model: Arc::new(model),
        };

        // Port 0 binds a random port for testing
        let addr = common.listen_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Server started on :{}", port);

        Ok(Self {
            port,
            listener,
            router: router(state, upload),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
