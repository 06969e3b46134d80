pub mod aggregation;
pub mod classifier;
pub mod error;
pub mod extraction;
pub mod negation;
pub mod pipeline;
pub mod provenance;
pub mod schema;
pub mod section_detector;

use tracing_subscriber::EnvFilter;

/// Initializes structured logging from `RUST_LOG`, falling back to
/// `info` for this crate and `warn` elsewhere.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,extraction_engine=info")))
        .init();
}
