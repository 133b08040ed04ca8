pub mod metrics;
pub mod prompt;
pub mod providers;

pub use prompt::PRODUCT_ANALYSIS_PROMPT;
pub use providers::gemini::GeminiClientFactory;
pub use providers::{ClientFactory, VisionClient};
pub use metrics::{get_metrics, init_metrics};
