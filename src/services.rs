//! Service container
//!
//! Wires the registry, directory and index store into the services the CLI
//! and embedding applications call.
//!
//! ```text
//! Services
//! ├── resolver       pointer / reference / blob reads
//! ├── authors        identity → author
//! ├── aggregates     votes, reactions, replies, followers
//! ├── notifications  paged notification reads
//! └── votes          vote writes → IndexMaintainer (EventBus)
//! ```

use std::sync::Arc;
use tracing::info;

use crate::aggregate::AggregateReader;
use crate::authors::AuthorResolver;
use crate::config::Config;
use crate::directory::{IdentityDirectory, StaticDirectory};
use crate::error::Result;
use crate::events::{spawn_logging_listener, EventBus};
use crate::index::IndexStore;
use crate::notifications::NotificationEngine;
use crate::partition::Partition;
use crate::registry::{spawn_eviction_listener, DirectoryLoader, NoExternalLoader, PartitionLoader, PartitionRegistry};
use crate::resolver::ReferenceResolver;
use crate::types::Identity;
use crate::votes::VoteService;

/// Service container for dependency injection
pub struct Services {
    pub registry: Arc<PartitionRegistry>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub index: IndexStore,
    pub resolver: Arc<ReferenceResolver>,
    pub authors: Arc<AuthorResolver>,
    pub aggregates: Arc<AggregateReader>,
    pub notifications: Arc<NotificationEngine>,
    pub votes: Arc<VoteService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services over an existing registry and index
    pub fn new(
        registry: Arc<PartitionRegistry>,
        directory: Arc<dyn IdentityDirectory>,
        index: IndexStore,
        domain: &str,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let authors = Arc::new(AuthorResolver::new(registry.clone(), domain));

        Self {
            resolver: Arc::new(ReferenceResolver::new(registry.clone(), directory.clone())),
            aggregates: Arc::new(AggregateReader::new(index.clone(), directory.clone())),
            notifications: Arc::new(NotificationEngine::new(
                index.clone(),
                registry.clone(),
                directory.clone(),
                authors.clone(),
            )),
            votes: Arc::new(VoteService::new(registry.clone(), events.clone())),
            authors,
            registry,
            directory,
            index,
            events,
        }
    }

    /// Open hosted partitions and the index database described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let partitions_dir = config.partitions_dir();
        std::fs::create_dir_all(&partitions_dir)?;

        let loader: Arc<dyn PartitionLoader> = match (&config.external_partitions_dir, config.allow_external_load) {
            (Some(dir), true) => Arc::new(DirectoryLoader::new(dir, config.cache_capacity_bytes)),
            _ => Arc::new(NoExternalLoader),
        };
        let registry = Arc::new(PartitionRegistry::new(loader));
        registry.open_hosted_dir(&partitions_dir, config.cache_capacity_bytes)?;

        let directory = StaticDirectory::from_registry(&registry);
        for (origin, identity) in &config.origins {
            directory.register(origin, identity.as_str());
        }

        let server = Partition::open_or_create(
            config.index_db_path(),
            Identity::new(format!("server@{}", config.domain)),
            format!("hyper://{}/", config.domain),
            config.cache_capacity_bytes,
        )?;

        info!(
            hosted = registry.len(),
            origins = directory.len(),
            storage_dir = %config.storage_dir.display(),
            "Services opened"
        );

        Ok(Self::new(
            registry,
            Arc::new(directory),
            IndexStore::new(Arc::new(server)),
            &config.domain,
        ))
    }

    /// Start the event logging and partition eviction listeners
    pub fn spawn_listeners(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            spawn_logging_listener(self.events.clone()),
            spawn_eviction_listener(self.registry.clone(), self.events.clone()),
        ]
    }

    /// Flush the index database and every hosted partition
    pub async fn flush(&self) -> Result<()> {
        self.index.partition().flush().await?;
        for identity in self.registry.identities() {
            if let Some(partition) = self.registry.hosted(&identity) {
                partition.flush().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::votes::{Session, VoteInput, VoteValue};

    #[tokio::test]
    async fn test_open_hosts_partitions_from_storage_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            storage_dir: dir.path().to_path_buf(),
            domain: "example.com".into(),
            ..Config::default()
        };
        std::fs::create_dir_all(config.partitions_dir()).unwrap();
        {
            let db = sled::open(config.partitions_dir().join("alice.sled")).unwrap();
            Partition::create(db, Identity::from("alice@example.com"), "hyper://alice").unwrap();
        }

        let services = Services::open(&config).unwrap();
        assert_eq!(services.registry.len(), 1);
        assert_eq!(
            services.directory.lookup("hyper://alice/").await.unwrap(),
            Some(Identity::from("alice@example.com"))
        );

        let session = Session::new("alice@example.com");
        let written = services
            .votes
            .put_vote(
                Some(&session),
                VoteInput {
                    subject_url: "https://x/1".into(),
                    subject: None,
                    vote: VoteValue::Up,
                },
            )
            .await
            .unwrap();
        let read = services
            .resolver
            .db_get(&written.url, &Default::default())
            .await
            .unwrap();
        assert!(read.is_found());
        services.flush().await.unwrap();
    }
}
