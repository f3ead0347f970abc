// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::auth;
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::redis;

// Domain layer
pub mod identity;
pub mod notification;
pub mod push;
pub mod store;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;

// Supporting modules
pub mod tasks;
pub mod telemetry;
