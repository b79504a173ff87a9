//! Partition registry
//!
//! Process-wide map of identity → partition. Hosted partitions are opened at
//! startup and are writable; partitions of other nodes are loaded on first
//! access through a [`PartitionLoader`] and kept read-only until evicted.

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{EventBus, IndexEvent};
use crate::partition::Partition;
use crate::types::Identity;

/// Loads partitions that are not hosted on this node
#[async_trait]
pub trait PartitionLoader: Send + Sync {
    /// Fetch the partition owned by `identity`, or `None` if it cannot be reached
    async fn load(&self, identity: &Identity) -> Result<Option<Partition>>;
}

/// Loader for nodes that never reach out for foreign partitions
pub struct NoExternalLoader;

#[async_trait]
impl PartitionLoader for NoExternalLoader {
    async fn load(&self, _identity: &Identity) -> Result<Option<Partition>> {
        Ok(None)
    }
}

/// Loads replicated partitions from `<dir>/<identity>.sled`
pub struct DirectoryLoader {
    dir: PathBuf,
    cache_capacity: u64,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>, cache_capacity: u64) -> Self {
        Self {
            dir: dir.into(),
            cache_capacity,
        }
    }
}

#[async_trait]
impl PartitionLoader for DirectoryLoader {
    async fn load(&self, identity: &Identity) -> Result<Option<Partition>> {
        let path = self.dir.join(format!("{}.sled", identity));
        if !tokio::fs::try_exists(&path).await? {
            debug!(identity = %identity, path = %path.display(), "No replica on disk");
            return Ok(None);
        }
        let partition = Partition::open(&path, self.cache_capacity)?;
        if partition.identity() != identity {
            warn!(
                expected = %identity,
                actual = %partition.identity(),
                "Replica owner mismatch, ignoring"
            );
            return Ok(None);
        }
        Ok(Some(partition.into_read_only()))
    }
}

/// Registry of known partitions
pub struct PartitionRegistry {
    partitions: DashMap<Identity, Arc<Partition>>,
    loader: Arc<dyn PartitionLoader>,
}

impl PartitionRegistry {
    pub fn new(loader: Arc<dyn PartitionLoader>) -> Self {
        Self {
            partitions: DashMap::new(),
            loader,
        }
    }

    /// Registry that never loads foreign partitions
    pub fn local_only() -> Self {
        Self::new(Arc::new(NoExternalLoader))
    }

    /// Register a partition, replacing any previous one for the same identity
    pub fn insert(&self, partition: Partition) -> Arc<Partition> {
        let partition = Arc::new(partition);
        self.partitions
            .insert(partition.identity().clone(), partition.clone());
        partition
    }

    /// Cached partition for `identity`, without loading
    pub fn get(&self, identity: &Identity) -> Option<Arc<Partition>> {
        self.partitions.get(identity).map(|p| p.value().clone())
    }

    /// Cached partition owned by a user of this node
    pub fn hosted(&self, identity: &Identity) -> Option<Arc<Partition>> {
        self.get(identity).filter(|p| p.is_writable())
    }

    /// Load a partition through the external loader and cache it
    pub async fn load_external(&self, identity: &Identity) -> Result<Option<Arc<Partition>>> {
        match self.loader.load(identity).await? {
            Some(partition) => {
                info!(identity = %identity, "Loaded external partition");
                Ok(Some(self.insert(partition)))
            }
            None => Ok(None),
        }
    }

    /// Forget a partition. Returns whether it was cached.
    pub fn evict(&self, identity: &Identity) -> bool {
        let removed = self.partitions.remove(identity).is_some();
        if removed {
            info!(identity = %identity, "Evicted partition");
        }
        removed
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.partitions.iter().map(|p| p.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Open every `*.sled` partition in `dir` as hosted. Returns how many opened.
    pub fn open_hosted_dir(&self, dir: &Path, cache_capacity: u64) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }
        let mut opened = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sled") {
                continue;
            }
            match Partition::open(&path, cache_capacity) {
                Ok(partition) => {
                    self.insert(partition);
                    opened += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable partition"),
            }
        }
        info!(count = opened, dir = %dir.display(), "Hosted partitions opened");
        Ok(opened)
    }
}

/// Evict partitions when the event bus reports them dropped
pub fn spawn_eviction_listener(
    registry: Arc<PartitionRegistry>,
    events: Arc<EventBus>,
) -> tokio::task::JoinHandle<()> {
    let mut receiver = events.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(IndexEvent::PartitionDropped { identity }) => {
                    registry.evict(&identity);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Eviction listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping eviction listener");
                    break;
                }
            }
        }
    })
}
