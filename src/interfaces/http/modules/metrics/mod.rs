//! Prometheus scrape endpoint and per-request HTTP metrics

pub mod handlers;
pub mod middleware;

pub use handlers::{metrics_router, MetricsState};
pub use middleware::http_metrics_middleware;
