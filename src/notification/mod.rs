//! Notification fan-out and delivery.
//!
//! A notification travels through four stages:
//!
//! - [`RecipientResolver`]: scope descriptor to identity set, dropping
//!   elevated identities from course and faculty-wide scopes
//! - [`TokenAggregator`]: identity set to push registrations
//! - [`BatchDispatcher`]: registrations to provider calls of at most 500
//!   tokens, pruning registrations the provider reports as gone
//! - [`NotificationPipeline`]: the three above as one `notify` call

mod aggregator;
mod dispatcher;
mod pipeline;
mod resolver;
mod role;
mod types;

pub use aggregator::TokenAggregator;
pub use dispatcher::{
    BatchDispatcher, BatchErrorPolicy, DispatchConfig, DispatchError, DispatchReport,
    DispatcherStats, DispatcherStatsSnapshot,
};
pub use pipeline::{NotificationPipeline, NotifyError, NotifySummary};
pub use resolver::RecipientResolver;
pub use role::{Role, RoleClassifier, RoleRecord};
pub use types::{
    AndroidPriority, DeletionHandle, NotificationPayload, NotificationPayloadBuilder,
    PushRegistration, ScopeDescriptor,
};
