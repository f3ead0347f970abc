use serde::{Deserialize, Serialize};

/// Lifetime Google accepts for a self-signed assertion
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Claims of the self-signed JWT exchanged for an OAuth2 access token
/// (RFC 7523 JWT bearer grant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Service account e-mail
    pub iss: String,
    /// Space separated OAuth scopes
    pub scope: String,
    /// Token endpoint the assertion is presented to
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(issuer: &str, scopes: &[&str], audience: &str, now: i64) -> Self {
        Self {
            iss: issuer.to_string(),
            scope: scopes.join(" "),
            aud: audience.to_string(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        }
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes_are_space_joined() {
        let claims = AssertionClaims::new(
            "svc@project.iam.gserviceaccount.com",
            &["scope-a", "scope-b"],
            "https://oauth2.googleapis.com/token",
            1_000,
        );

        assert_eq!(claims.scope, "scope-a scope-b");
        assert_eq!(claims.exp, 1_000 + ASSERTION_LIFETIME_SECS);
        assert!(claims.is_expired());
    }
}
