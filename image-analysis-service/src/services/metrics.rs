//! Prometheus metrics for image-analysis-service.
//!
//! Tracks analysis requests by response status, model latency, model
//! errors by category and token usage.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Registry plus every collector registered with it.
pub struct Metrics {
    registry: Registry,
    analysis_requests: IntCounterVec,
    model_latency: HistogramVec,
    model_errors: IntCounterVec,
    model_tokens: IntCounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let analysis_requests = IntCounterVec::new(
            Opts::new(
                "image_analysis_requests_total",
                "Total image analysis requests by response status",
            ),
            &["status"],
        )?;

        let model_latency = HistogramVec::new(
            HistogramOpts::new(
                "image_analysis_model_latency_seconds",
                "Vision model call latency in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["model"],
        )?;

        let model_errors = IntCounterVec::new(
            Opts::new(
                "image_analysis_model_errors_total",
                "Total vision model errors by category",
            ),
            &["model", "error_type"],
        )?;

        // type: input, output
        let model_tokens = IntCounterVec::new(
            Opts::new("image_analysis_tokens_total", "Total tokens processed"),
            &["model", "type"],
        )?;

        registry.register(Box::new(analysis_requests.clone()))?;
        registry.register(Box::new(model_latency.clone()))?;
        registry.register(Box::new(model_errors.clone()))?;
        registry.register(Box::new(model_tokens.clone()))?;

        Ok(Self {
            registry,
            analysis_requests,
            model_latency,
            model_errors,
            model_tokens,
        })
    }
}

/// Initialize the metrics registry. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = Metrics::new()?;
    if METRICS.set(metrics).is_ok() {
        tracing::info!("Prometheus metrics initialized");
    }
    Ok(())
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let metrics = match METRICS.get() {
        Some(m) => m,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

/// Record a finished `/analyze-image` request.
pub fn record_analysis_request(status: u16) {
    if let Some(m) = METRICS.get() {
        m.analysis_requests
            .with_label_values(&[status.to_string().as_str()])
            .inc();
    }
}

/// Record how long the model call took, successful or not.
pub fn record_model_latency(model: &str, duration_secs: f64) {
    if let Some(m) = METRICS.get() {
        m.model_latency
            .with_label_values(&[model])
            .observe(duration_secs);
    }
}

/// Record a failed model call.
pub fn record_model_error(model: &str, error_type: &str) {
    if let Some(m) = METRICS.get() {
        m.model_errors.with_label_values(&[model, error_type]).inc();
    }
}

/// Record token usage reported by the model.
pub fn record_tokens(model: &str, input_tokens: u64, output_tokens: u64) {
    if let Some(m) = METRICS.get() {
        m.model_tokens
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens);
        m.model_tokens
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens);
    }
}
