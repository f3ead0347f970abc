//! API layer - HTTP endpoint handlers and routing.

mod health;
mod metrics;
mod routes;

pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
