//! HTTP handlers for the image analysis service.

pub mod analyze;
pub mod health;
pub mod metrics;

pub use analyze::{analyze_image, method_not_allowed};
pub use health::health_check;
pub use metrics::metrics_endpoint;
