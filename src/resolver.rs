//! Reference resolution
//!
//! Turns pointers into stored values:
//!
//! ```text
//! pointer URL ──► origin ──► identity ──► partition ──► sub-collections ──► key
//!                    │            │             │
//!                    │            │             └─ cache miss: external loader
//!                    │            └─ unknown: Resolution{unknown-identity}
//!                    └─ unparseable: InvalidArgument
//! ```
//!
//! A missing key is not an error: [`ResolvedEntry::entry`] is `None`.

use std::sync::Arc;
use tracing::debug;

use crate::directory::IdentityDirectory;
use crate::error::{IndexError, Result};
use crate::partition::{Entry, Partition};
use crate::reference::{parse_pointer, Reference};
use crate::registry::PartitionRegistry;
use crate::types::Identity;

/// Options for a single resolution
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Identity to load when the origin cannot be mapped
    pub owner: Option<Identity>,
    /// Only use partitions already cached on this node
    pub no_load_external: bool,
}

impl GetOptions {
    pub fn local_only() -> Self {
        Self {
            no_load_external: true,
            ..Default::default()
        }
    }

    pub fn with_owner(owner: impl Into<Identity>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Default::default()
        }
    }
}

/// Result of a pointer lookup
#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    /// Partition the pointer resolved into
    pub partition: Arc<Partition>,
    /// The record, or `None` if the key does not exist
    pub entry: Option<Entry>,
}

impl ResolvedEntry {
    pub fn is_found(&self) -> bool {
        self.entry.is_some()
    }
}

/// Resolves pointers against the partition registry
pub struct ReferenceResolver {
    registry: Arc<PartitionRegistry>,
    directory: Arc<dyn IdentityDirectory>,
}

impl ReferenceResolver {
    pub fn new(registry: Arc<PartitionRegistry>, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    /// Resolve a pointer URL to the record it names
    pub async fn db_get(&self, pointer: &str, opts: &GetOptions) -> Result<ResolvedEntry> {
        let path = parse_pointer(pointer)?;
        let (key, collection) = path.segments.split_last().ok_or_else(|| {
            IndexError::InvalidArgument(format!("Pointer needs a key: {}", pointer))
        })?;

        let identity = match self.directory.lookup(&path.origin).await {
            Ok(identity) => identity,
            Err(e) => {
                debug!(origin = %path.origin, error = %e, "Origin lookup failed");
                None
            }
        };

        let partition = self.partition_for(identity.as_ref(), pointer, opts).await?;
        let table = if collection.is_empty() {
            partition.root()?
        } else {
            partition.sub(collection)?
        };
        let entry = table.get(key)?;
        Ok(ResolvedEntry { partition, entry })
    }

    /// Resolve a structured reference
    pub async fn resolve_reference(&self, reference: &Reference, opts: &GetOptions) -> Result<ResolvedEntry> {
        let partition = self
            .partition_for(Some(&reference.identity), reference.identity.as_str(), opts)
            .await?;
        let entry = partition.table(&reference.table_id)?.get(&reference.key)?;
        Ok(ResolvedEntry { partition, entry })
    }

    /// Read a named blob from the partition of `db_id` (an identity or origin)
    pub async fn blob_get(&self, db_id: &str, blob_name: &str, opts: &GetOptions) -> Result<Option<Vec<u8>>> {
        if blob_name.is_empty() {
            return Err(IndexError::InvalidArgument("Must specify a blob name".into()));
        }
        let identity = self.directory.lookup(db_id).await?;
        if identity.is_none() && opts.owner.is_none() {
            return Err(IndexError::unknown_identity(db_id));
        }
        let partition = self.partition_for(identity.as_ref(), db_id, opts).await?;
        partition.get_blob(blob_name)
    }

    /// Cached partition, or an external load unless forbidden
    async fn partition_for(
        &self,
        identity: Option<&Identity>,
        target: &str,
        opts: &GetOptions,
    ) -> Result<Arc<Partition>> {
        if let Some(partition) = identity.and_then(|id| self.registry.get(id)) {
            return Ok(partition);
        }

        let owner = identity
            .or(opts.owner.as_ref())
            .ok_or_else(|| IndexError::unknown_identity(target))?;

        if opts.no_load_external {
            return Err(IndexError::unavailable(owner.as_str()));
        }

        self.registry
            .load_external(owner)
            .await?
            .ok_or_else(|| IndexError::unavailable(owner.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::error::ResolutionFailure;
    use crate::registry::PartitionLoader;
    use async_trait::async_trait;
    use serde_json::json;

    struct RemoteLoader;

    #[async_trait]
    impl PartitionLoader for RemoteLoader {
        async fn load(&self, identity: &Identity) -> Result<Option<Partition>> {
            if identity.as_str() != "carol@remote.net" {
                return Ok(None);
            }
            let p = Partition::temporary(identity.clone(), "hyper://carol")?;
            p.table("ctzn.network/post")?.put("1", &json!({"text": "remote"}))?;
            Ok(Some(p.into_read_only()))
        }
    }

    fn setup() -> ReferenceResolver {
        let registry = Arc::new(PartitionRegistry::new(Arc::new(RemoteLoader)));
        let alice = Partition::temporary("alice@example.com", "hyper://alice").unwrap();
        alice
            .sub(&["ctzn.network", "post"])
            .unwrap()
            .put("1", &json!({"text": "hello"}))
            .unwrap();
        alice.put_blob("avatar", b"img").unwrap();
        registry.insert(alice);

        let directory = StaticDirectory::new();
        directory.register("hyper://alice", "alice@example.com");
        directory.register("hyper://carol", "carol@remote.net");
        directory.register("hyper://dave", "dave@gone.net");
        ReferenceResolver::new(registry, Arc::new(directory))
    }

    #[tokio::test]
    async fn test_found_and_not_found() {
        let resolver = setup();
        let opts = GetOptions::default();

        let found = resolver.db_get("hyper://alice/ctzn.network/post/1", &opts).await.unwrap();
        assert!(found.is_found());
        assert_eq!(found.entry.unwrap().value["text"], "hello");
        assert_eq!(found.partition.identity().as_str(), "alice@example.com");

        let missing = resolver.db_get("hyper://alice/ctzn.network/post/2", &opts).await.unwrap();
        assert!(!missing.is_found());
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let resolver = setup();
        let err = resolver
            .db_get("hyper://nobody/ctzn.network/post/1", &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.resolution_failure(), Some(ResolutionFailure::UnknownIdentity));
    }

    #[tokio::test]
    async fn test_owner_hint_used_for_unknown_origin() {
        let resolver = setup();
        let found = resolver
            .db_get(
                "hyper://nobody/ctzn.network/post/1",
                &GetOptions::with_owner("carol@remote.net"),
            )
            .await
            .unwrap();
        assert_eq!(found.entry.unwrap().value["text"], "remote");
    }

    #[tokio::test]
    async fn test_external_load_and_local_only() {
        let resolver = setup();
        let pointer = "hyper://carol/ctzn.network/post/1";

        let err = resolver.db_get(pointer, &GetOptions::local_only()).await.unwrap_err();
        assert_eq!(err.resolution_failure(), Some(ResolutionFailure::Unavailable));

        let found = resolver.db_get(pointer, &GetOptions::default()).await.unwrap();
        assert_eq!(found.entry.unwrap().value["text"], "remote");

        // cached now, so local-only succeeds
        assert!(resolver.db_get(pointer, &GetOptions::local_only()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_partition() {
        let resolver = setup();
        let err = resolver
            .db_get("hyper://dave/ctzn.network/post/1", &GetOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.resolution_failure(), Some(ResolutionFailure::Unavailable));
    }

    #[tokio::test]
    async fn test_pointer_without_key() {
        let resolver = setup();
        let err = resolver.db_get("hyper://alice/", &GetOptions::default()).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_single_segment_reads_root_collection() {
        let resolver = setup();
        let opts = GetOptions::default();
        let alice = resolver.registry.get(&Identity::from("alice@example.com")).unwrap();
        alice.root().unwrap().put("pinned", &json!({"text": "top"})).unwrap();

        let found = resolver.db_get("hyper://alice/pinned", &opts).await.unwrap();
        assert_eq!(found.entry.unwrap().value["text"], "top");

        let missing = resolver.db_get("hyper://alice/post", &opts).await.unwrap();
        assert!(!missing.is_found());
    }

    #[tokio::test]
    async fn test_resolve_reference() {
        let resolver = setup();
        let reference = Reference::new("carol@remote.net", "ctzn.network/post", "1");
        let found = resolver.resolve_reference(&reference, &GetOptions::default()).await.unwrap();
        assert!(found.is_found());
    }

    #[tokio::test]
    async fn test_blob_get() {
        let resolver = setup();
        let opts = GetOptions::default();
        assert_eq!(
            resolver.blob_get("alice@example.com", "avatar", &opts).await.unwrap(),
            Some(b"img".to_vec())
        );
        assert_eq!(resolver.blob_get("hyper://alice/", "other", &opts).await.unwrap(), None);
        assert!(matches!(
            resolver.blob_get("alice@example.com", "", &opts).await,
            Err(IndexError::InvalidArgument(_))
        ));
        let err = resolver.blob_get("hyper://nobody/", "avatar", &opts).await.unwrap_err();
        assert_eq!(err.resolution_failure(), Some(ResolutionFailure::UnknownIdentity));
    }
}
