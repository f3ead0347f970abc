use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::metrics::ResolutionMetrics;
use crate::store::{IdentityDirectory, StoreError};

use super::{RoleClassifier, ScopeDescriptor};

/// Turns a scope descriptor into the set of identities to notify.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn IdentityDirectory>,
    classifier: RoleClassifier,
    lookup_concurrency: usize,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn IdentityDirectory>, lookup_concurrency: usize) -> Self {
        Self {
            classifier: RoleClassifier::new(directory.clone()),
            directory,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Personal scope yields its owner unconditionally. Course and
    /// faculty-wide scopes never yield an elevated identity.
    #[tracing::instrument(
        name = "resolver.resolve",
        skip(self),
        fields(scope = %scope)
    )]
    pub async fn resolve(&self, scope: &ScopeDescriptor) -> Result<HashSet<String>, StoreError> {
        let candidates: HashSet<String> = match scope {
            ScopeDescriptor::Personal(owner) => HashSet::from([owner.clone()]),
            ScopeDescriptor::Course(code) => self
                .directory
                .identities_in_course(code)
                .await?
                .into_iter()
                .collect(),
            ScopeDescriptor::FacultyWide(faculty) => self
                .directory
                .identities_in_faculty(faculty)
                .await?
                .into_iter()
                .collect(),
        };

        let candidate_count = candidates.len();
        let recipients = if scope.excludes_elevated() {
            self.exclude_elevated(candidates).await?
        } else {
            candidates
        };

        let excluded = candidate_count - recipients.len();
        if excluded > 0 {
            ResolutionMetrics::record_elevated_excluded(excluded as u64);
        }
        ResolutionMetrics::record_resolved(scope.kind(), recipients.len());

        tracing::debug!(
            candidates = candidate_count,
            recipients = recipients.len(),
            excluded = excluded,
            "Resolved recipients"
        );

        Ok(recipients)
    }

    async fn exclude_elevated(
        &self,
        candidates: HashSet<String>,
    ) -> Result<HashSet<String>, StoreError> {
        let checked: Vec<(String, bool)> = stream::iter(candidates)
            .map(|identity| {
                let classifier = self.classifier.clone();
                async move {
                    let elevated = classifier.is_elevated(&identity).await?;
                    Ok::<_, StoreError>((identity, elevated))
                }
            })
            .buffer_unordered(self.lookup_concurrency)
            .try_collect()
            .await?;

        Ok(checked
            .into_iter()
            .filter_map(|(identity, elevated)| (!elevated).then_some(identity))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Role, RoleRecord};
    use crate::store::{MemoryStore, UserProfile};

    fn store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (uid, faculty, courses) in [
            ("s1", "eng", vec!["CS101"]),
            ("s2", "eng", vec!["CS101", "MA201"]),
            ("a1", "eng", vec!["CS101"]),
            ("s3", "med", vec!["MA201"]),
        ] {
            store.insert_user(
                uid,
                UserProfile {
                    faculty_id: Some(faculty.to_string()),
                    enrolled_courses: courses.into_iter().map(String::from).collect(),
                    ..Default::default()
                },
            );
        }
        store.set_role("a1", RoleRecord::with_role(Role::Admin));
        store
    }

    #[tokio::test]
    async fn test_course_scope_excludes_elevated() {
        let resolver = RecipientResolver::new(store(), 4);
        let recipients = resolver
            .resolve(&ScopeDescriptor::Course("CS101".into()))
            .await
            .unwrap();

        assert_eq!(recipients, HashSet::from(["s1".to_string(), "s2".to_string()]));
    }

    #[tokio::test]
    async fn test_faculty_scope_excludes_elevated() {
        let resolver = RecipientResolver::new(store(), 1);
        let recipients = resolver
            .resolve(&ScopeDescriptor::FacultyWide("eng".into()))
            .await
            .unwrap();

        assert_eq!(recipients.len(), 2);
        assert!(!recipients.contains("a1"));
    }

    #[tokio::test]
    async fn test_personal_scope_keeps_elevated_owner() {
        let resolver = RecipientResolver::new(store(), 4);
        let recipients = resolver
            .resolve(&ScopeDescriptor::Personal("a1".into()))
            .await
            .unwrap();

        assert_eq!(recipients, HashSet::from(["a1".to_string()]));
    }

    #[tokio::test]
    async fn test_no_matches_is_empty() {
        let resolver = RecipientResolver::new(store(), 4);
        let recipients = resolver
            .resolve(&ScopeDescriptor::Course("PH999".into()))
            .await
            .unwrap();

        assert!(recipients.is_empty());
    }
}
