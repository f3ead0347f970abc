//! Elevation (admin-like) classification of identities.
//!
//! Role documents were written under several schemas over time and were never
//! migrated, so the read side accepts every encoding. New records should only
//! set `role`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::{IdentityDirectory, StoreError};

/// Value of the `role` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    SuperAdmin,
    Other(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Role::Admin,
            "superAdmin" => Role::SuperAdmin,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => "admin".to_string(),
            Role::SuperAdmin => "superAdmin".to_string(),
            Role::Other(value) => value,
        }
    }
}

/// `roles/{uid}` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// Canonical encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Legacy boolean admin flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    /// Legacy level marker, "super" means elevated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Legacy super-admin flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_admin: Option<bool>,
}

impl RoleRecord {
    pub fn with_role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    /// True when any encoding marks the identity as admin or higher.
    pub fn is_elevated(&self) -> bool {
        matches!(self.role, Some(Role::Admin) | Some(Role::SuperAdmin))
            || self.admin == Some(true)
            || self.level.as_deref() == Some("super")
            || self.super_admin == Some(true)
    }
}

/// Looks up role documents and applies [`RoleRecord::is_elevated`].
#[derive(Clone)]
pub struct RoleClassifier {
    directory: Arc<dyn IdentityDirectory>,
}

impl RoleClassifier {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    /// Missing role document means not elevated. Lookup errors propagate.
    pub async fn is_elevated(&self, identity_id: &str) -> Result<bool, StoreError> {
        let record = self.directory.role_record(identity_id).await?;
        Ok(record.is_some_and(|r| r.is_elevated()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_encoding_is_elevated() {
        let records = [
            RoleRecord::with_role(Role::Admin),
            RoleRecord::with_role(Role::SuperAdmin),
            RoleRecord {
                admin: Some(true),
                ..Default::default()
            },
            RoleRecord {
                level: Some("super".into()),
                ..Default::default()
            },
            RoleRecord {
                super_admin: Some(true),
                ..Default::default()
            },
        ];

        for record in records {
            assert!(record.is_elevated(), "{:?} should be elevated", record);
        }
    }

    #[test]
    fn test_non_elevated_records() {
        let records = [
            RoleRecord::default(),
            RoleRecord::with_role(Role::Other("student".into())),
            RoleRecord {
                admin: Some(false),
                level: Some("basic".into()),
                super_admin: Some(false),
                ..Default::default()
            },
        ];

        for record in records {
            assert!(!record.is_elevated(), "{:?} should not be elevated", record);
        }
    }

    #[test]
    fn test_role_record_from_legacy_document() {
        let record: RoleRecord =
            serde_json::from_str(r#"{"role": "superAdmin", "super_admin": false}"#).unwrap();
        assert_eq!(record.role, Some(Role::SuperAdmin));
        assert!(record.is_elevated());

        let record: RoleRecord = serde_json::from_str(r#"{"role": "Admin"}"#).unwrap();
        assert_eq!(record.role, Some(Role::Other("Admin".into())));
        assert!(!record.is_elevated());
    }
}
