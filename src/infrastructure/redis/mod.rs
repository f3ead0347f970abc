//! Redis plumbing shared by the document store backend and the event subscriber.
//!
//! - `pool`: multiplexed connection reused by store operations
//! - `backoff`: exponential reconnect delays for the Pub/Sub subscriber

mod backoff;
pub mod pool;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use pool::{PoolError, RedisPool};
