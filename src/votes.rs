//! Vote mutation path
//!
//! A vote lives in the voter's own partition under `ctzn.network/vote`,
//! keyed by the subject URL, so voting twice on one subject overwrites the
//! earlier vote. Every write is flushed and reported to the index
//! maintainer before the call returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{IndexError, Result};
use crate::events::IndexMaintainer;
use crate::partition::{Partition, VOTES_TABLE};
use crate::reference::construct_entry_url;
use crate::registry::PartitionRegistry;
use crate::types::{Identity, SubjectSummary};

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Identity,
}

impl Session {
    pub fn new(user_id: impl Into<Identity>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Direction of a vote, stored as `1` or `-1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum VoteValue {
    Up,
    Down,
}

impl TryFrom<i8> for VoteValue {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(format!("vote must be 1 or -1, got {}", other)),
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

/// A vote as submitted by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteInput {
    #[serde(default)]
    pub subject_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectSummary>,
    pub vote: VoteValue,
}

/// A vote as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub subject_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectSummary>,
    pub vote: VoteValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteWriteResult {
    pub key: String,
    pub url: String,
}

pub struct VoteService {
    registry: Arc<PartitionRegistry>,
    maintainer: Arc<dyn IndexMaintainer>,
}

impl VoteService {
    pub fn new(registry: Arc<PartitionRegistry>, maintainer: Arc<dyn IndexMaintainer>) -> Self {
        Self {
            registry,
            maintainer,
        }
    }

    /// Record (or replace) the caller's vote on a subject
    pub async fn put_vote(&self, session: Option<&Session>, vote: VoteInput) -> Result<VoteWriteResult> {
        let partition = self.own_partition(session)?;

        let key = vote.subject_url;
        if key.is_empty() {
            return Err(IndexError::InvalidArgument("Subject URL is required".into()));
        }

        let record = VoteRecord {
            subject_url: key.clone(),
            subject: vote.subject,
            vote: vote.vote,
            created_at: Utc::now(),
        };
        partition.table(VOTES_TABLE)?.put(&key, &record)?;
        self.commit(&partition).await?;

        info!(user = %partition.identity(), subject = %key, vote = ?record.vote, "Vote recorded");
        let url = construct_entry_url(partition.url(), VOTES_TABLE, &key);
        Ok(VoteWriteResult { key, url })
    }

    /// Remove the caller's vote. Returns whether a vote existed.
    pub async fn delete_vote(&self, session: Option<&Session>, key: &str) -> Result<bool> {
        let partition = self.own_partition(session)?;

        let existed = partition.table(VOTES_TABLE)?.del(key)?;
        self.commit(&partition).await?;

        info!(user = %partition.identity(), subject = %key, existed, "Vote removed");
        Ok(existed)
    }

    fn own_partition(&self, session: Option<&Session>) -> Result<Arc<Partition>> {
        let session = session.ok_or(IndexError::Unauthenticated)?;
        self.registry
            .hosted(&session.user_id)
            .ok_or_else(|| IndexError::NotFound("User database not found".into()))
    }

    async fn commit(&self, partition: &Partition) -> Result<()> {
        futures::try_join!(
            partition.flush(),
            self.maintainer.on_partition_change(partition)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, IndexEvent};
    use async_trait::async_trait;

    struct FailingMaintainer;

    #[async_trait]
    impl IndexMaintainer for FailingMaintainer {
        async fn on_partition_change(&self, _partition: &Partition) -> Result<()> {
            Err(IndexError::Config("maintainer offline".into()))
        }
    }

    fn setup(maintainer: Arc<dyn IndexMaintainer>) -> (VoteService, Arc<PartitionRegistry>) {
        let registry = Arc::new(PartitionRegistry::local_only());
        registry.insert(Partition::temporary("alice@example.com", "hyper://alice").unwrap());
        registry.insert(
            Partition::temporary("remote@example.net", "hyper://remote")
                .unwrap()
                .into_read_only(),
        );
        (VoteService::new(registry.clone(), maintainer), registry)
    }

    fn upvote(subject: &str) -> VoteInput {
        VoteInput {
            subject_url: subject.into(),
            subject: None,
            vote: VoteValue::Up,
        }
    }

    #[tokio::test]
    async fn test_put_requires_session() {
        let (votes, _) = setup(Arc::new(EventBus::new()));
        let err = votes.put_vote(None, upvote("https://x/1")).await.unwrap_err();
        assert!(matches!(err, IndexError::Unauthenticated));
        assert_eq!(err.to_string(), "Must be logged in");
    }

    #[tokio::test]
    async fn test_put_requires_hosted_partition() {
        let (votes, _) = setup(Arc::new(EventBus::new()));
        for user in ["nobody@example.com", "remote@example.net"] {
            let session = Session::new(user);
            let err = votes
                .put_vote(Some(&session), upvote("https://x/1"))
                .await
                .unwrap_err();
            assert!(matches!(err, IndexError::NotFound(ref m) if m == "User database not found"));
        }
    }

    #[tokio::test]
    async fn test_put_requires_subject() {
        let (votes, _) = setup(Arc::new(EventBus::new()));
        let session = Session::new("alice@example.com");
        let err = votes.put_vote(Some(&session), upvote("")).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(ref m) if m == "Subject URL is required"));
    }

    #[tokio::test]
    async fn test_put_is_keyed_by_subject() {
        let bus = Arc::new(EventBus::new());
        let mut events = bus.subscribe();
        let (votes, registry) = setup(bus.clone());
        let session = Session::new("alice@example.com");

        let first = votes
            .put_vote(Some(&session), upvote("https://x/1"))
            .await
            .unwrap();
        assert_eq!(first.key, "https://x/1");
        assert_eq!(
            first.url,
            "hyper://alice/ctzn.network/vote/https%3A%2F%2Fx%2F1"
        );

        let mut down = upvote("https://x/1");
        down.vote = VoteValue::Down;
        let second = votes.put_vote(Some(&session), down).await.unwrap();
        assert_eq!(second, first);

        let partition = registry.get(&Identity::from("alice@example.com")).unwrap();
        let table = partition.table(VOTES_TABLE).unwrap();
        assert_eq!(table.len(), 1);
        let stored: VoteRecord = table.get_as("https://x/1").unwrap().unwrap();
        assert_eq!(stored.vote, VoteValue::Down);
        assert_eq!(stored.subject_url, "https://x/1");

        for _ in 0..2 {
            assert_eq!(
                events.recv().await.unwrap(),
                IndexEvent::PartitionChanged {
                    identity: Identity::from("alice@example.com")
                }
            );
        }
    }

    #[tokio::test]
    async fn test_delete_vote() {
        let (votes, registry) = setup(Arc::new(EventBus::new()));
        let session = Session::new("alice@example.com");
        votes
            .put_vote(Some(&session), upvote("https://x/1"))
            .await
            .unwrap();

        assert!(votes.delete_vote(Some(&session), "https://x/1").await.unwrap());
        assert!(!votes.delete_vote(Some(&session), "https://x/1").await.unwrap());

        let partition = registry.get(&Identity::from("alice@example.com")).unwrap();
        assert!(partition.table(VOTES_TABLE).unwrap().is_empty());

        let err = votes.delete_vote(None, "https://x/1").await.unwrap_err();
        assert!(matches!(err, IndexError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_maintainer_failure_surfaces() {
        let (votes, _) = setup(Arc::new(FailingMaintainer));
        let session = Session::new("alice@example.com");
        let err = votes
            .put_vote(Some(&session), upvote("https://x/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[test]
    fn test_vote_value_wire_format() {
        assert_eq!(serde_json::to_value(VoteValue::Down).unwrap(), serde_json::json!(-1));
        let input: VoteInput =
            serde_json::from_value(serde_json::json!({"subjectUrl": "https://x/1", "vote": 1})).unwrap();
        assert_eq!(input.vote, VoteValue::Up);
        assert!(serde_json::from_value::<VoteValue>(serde_json::json!(2)).is_err());
    }
}
