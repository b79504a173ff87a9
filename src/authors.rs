//! Author lookup
//!
//! Maps an identity to `{url, userId, displayName}` from the profile record
//! of a locally cached partition. A request that expands many references
//! passes one [`AuthorMemo`] through so each identity is looked up once.
//! The memo belongs to the request and is dropped with it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::partition::PROFILE_TABLE;
use crate::reference::construct_user_url;
use crate::registry::PartitionRegistry;
use crate::types::Identity;

/// Display metadata for an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub url: String,
    pub user_id: Identity,
    pub display_name: String,
}

/// Per-request author cache
#[derive(Debug, Default)]
pub struct AuthorMemo {
    authors: HashMap<Identity, Author>,
}

impl AuthorMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &Identity) -> Option<&Author> {
        self.authors.get(identity)
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn into_inner(self) -> HashMap<Identity, Author> {
        self.authors
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProfileRecord {
    display_name: Option<String>,
}

/// Resolves identities to authors
pub struct AuthorResolver {
    registry: Arc<PartitionRegistry>,
    domain: String,
}

impl AuthorResolver {
    pub fn new(registry: Arc<PartitionRegistry>, domain: impl Into<String>) -> Self {
        Self {
            registry,
            domain: domain.into(),
        }
    }

    /// Look up one author. Falls back to the identity as display name.
    pub fn fetch_author(&self, identity: &Identity, memo: Option<&mut AuthorMemo>) -> Author {
        if let Some(author) = memo.as_ref().and_then(|m| m.get(identity)) {
            return author.clone();
        }

        let author = Author {
            url: construct_user_url(identity, &self.domain),
            user_id: identity.clone(),
            display_name: self
                .profile_display_name(identity)
                .unwrap_or_else(|| identity.to_string()),
        };

        if let Some(memo) = memo {
            memo.authors.insert(identity.clone(), author.clone());
        }
        author
    }

    /// Look up several authors, in input order
    pub fn fetch_authors(&self, identities: &[Identity], memo: &mut AuthorMemo) -> Vec<Author> {
        identities
            .iter()
            .map(|id| self.fetch_author(id, Some(&mut *memo)))
            .collect()
    }

    fn profile_display_name(&self, identity: &Identity) -> Option<String> {
        let partition = self.registry.get(identity)?;
        let profile = partition
            .table(PROFILE_TABLE)
            .and_then(|t| t.get_as::<ProfileRecord>("self"));
        match profile {
            Ok(profile) => profile
                .and_then(|p| p.display_name)
                .filter(|name| !name.is_empty()),
            Err(e) => {
                debug!(identity = %identity, error = %e, "Profile unreadable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Partition;
    use serde_json::json;

    fn setup() -> AuthorResolver {
        let registry = Arc::new(PartitionRegistry::local_only());
        let alice = Partition::temporary("alice@example.com", "hyper://alice").unwrap();
        alice
            .table(PROFILE_TABLE)
            .unwrap()
            .put("self", &json!({"displayName": "Alice", "description": "hi"}))
            .unwrap();
        registry.insert(alice);
        AuthorResolver::new(registry, "node.local")
    }

    #[test]
    fn test_profile_display_name() {
        let authors = setup();
        let alice = authors.fetch_author(&Identity::from("alice@example.com"), None);
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(alice.url, "https://example.com/alice@example.com");
    }

    #[test]
    fn test_unknown_identity_falls_back() {
        let authors = setup();
        let bob = authors.fetch_author(&Identity::from("bob"), None);
        assert_eq!(bob.display_name, "bob");
        assert_eq!(bob.url, "https://node.local/bob");
    }

    #[test]
    fn test_memo_reused() {
        let authors = setup();
        let mut memo = AuthorMemo::new();
        let ids = vec![
            Identity::from("alice@example.com"),
            Identity::from("bob"),
            Identity::from("alice@example.com"),
        ];
        let result = authors.fetch_authors(&ids, &mut memo);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0], result[2]);
        assert_eq!(memo.len(), 2);

        // memo wins over the partition for the rest of the request
        authors.registry.evict(&Identity::from("alice@example.com"));
        let cached = authors.fetch_author(&Identity::from("alice@example.com"), Some(&mut memo));
        assert_eq!(cached.display_name, "Alice");
        let fresh = authors.fetch_author(&Identity::from("alice@example.com"), None);
        assert_eq!(fresh.display_name, "alice@example.com");
    }
}
