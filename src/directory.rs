//! Origin → identity mapping
//!
//! Pointers carry a network origin (`hyper://<key>/`), not an identity. The
//! directory translates one into the other. Lookups that go over the network
//! live behind [`IdentityDirectory`]; [`StaticDirectory`] covers the origins
//! this node already knows.

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

use crate::error::Result;
use crate::reference::url_origin;
use crate::registry::PartitionRegistry;
use crate::types::Identity;

/// Maps a network origin (or a bare identity) to an identity
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn lookup(&self, origin: &str) -> Result<Option<Identity>>;
}

/// In-memory directory of known origins
#[derive(Default)]
pub struct StaticDirectory {
    origins: DashMap<String, Identity>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with the origin of every registered partition
    pub fn from_registry(registry: &PartitionRegistry) -> Self {
        let directory = Self::new();
        for identity in registry.identities() {
            if let Some(partition) = registry.get(&identity) {
                directory.register(partition.origin(), identity);
            }
        }
        directory
    }

    pub fn register(&self, origin: &str, identity: impl Into<Identity>) {
        self.origins.insert(origin_of(origin), identity.into());
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn lookup(&self, origin: &str) -> Result<Option<Identity>> {
        let origin = origin_of(origin);
        if let Some(identity) = self.origins.get(&origin) {
            return Ok(Some(identity.value().clone()));
        }
        if is_bare_identity(&origin) {
            return Ok(Some(Identity::new(origin)));
        }
        Ok(None)
    }
}

/// Origin of a pointer with a host; any other string is returned unchanged
pub fn origin_of(pointer: &str) -> String {
    Url::parse(pointer)
        .ok()
        .and_then(|url| url_origin(&url))
        .unwrap_or_else(|| pointer.to_string())
}

/// Identity owning the partition a pointer points into
pub async fn fetch_user_id(
    directory: &dyn IdentityDirectory,
    pointer: &str,
) -> Result<Option<Identity>> {
    directory.lookup(&origin_of(pointer)).await
}

fn is_bare_identity(s: &str) -> bool {
    !s.contains("://") && s.contains('@') && !s.contains('/')
}
