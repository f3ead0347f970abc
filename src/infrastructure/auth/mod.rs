//! Google service-account authentication for outbound API calls.

mod claims;
mod token_source;

pub use claims::{AssertionClaims, ASSERTION_LIFETIME_SECS};
pub use token_source::{
    AccessTokenSource, AuthError, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource,
    CLOUD_PLATFORM_SCOPE, FIREBASE_MESSAGING_SCOPE,
};
