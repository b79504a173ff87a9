//! Aggregate index reader
//!
//! Expands index entries (lists of pointers) into lists of identities. Each
//! pointer is resolved independently; pointers whose origin the directory
//! cannot map are dropped without failing the read.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::directory::{fetch_user_id, IdentityDirectory};
use crate::error::Result;
use crate::fanout::resolve_all;
use crate::index::{IndexStore, ThreadItem};
use crate::types::{Identity, SubjectSummary};

/// Voters on one subject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotesForSubject {
    pub subject_url: String,
    pub upvoter_ids: Vec<Identity>,
    pub downvoter_ids: Vec<Identity>,
}

/// Reactors on one subject, grouped by reaction label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionsForSubject {
    pub subject: SubjectSummary,
    pub reactions: BTreeMap<String, Vec<Identity>>,
}

pub struct AggregateReader {
    index: IndexStore,
    directory: Arc<dyn IdentityDirectory>,
}

impl AggregateReader {
    pub fn new(index: IndexStore, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { index, directory }
    }

    pub async fn get_votes_for_subject(&self, subject_url: &str) -> Result<VotesForSubject> {
        let entry = self.index.votes(subject_url)?.unwrap_or_default();
        let (upvoter_ids, downvoter_ids) = futures::join!(
            self.user_ids(&entry.upvote_urls),
            self.user_ids(&entry.downvote_urls)
        );
        debug!(
            subject = subject_url,
            up = upvoter_ids.len(),
            down = downvoter_ids.len(),
            "Resolved votes"
        );
        Ok(VotesForSubject {
            subject_url: subject_url.to_string(),
            upvoter_ids,
            downvoter_ids,
        })
    }

    pub async fn get_reactions_for_subject(&self, subject_url: &str) -> Result<ReactionsForSubject> {
        let Some(entry) = self.index.reactions(subject_url)? else {
            return Ok(ReactionsForSubject {
                subject: SubjectSummary::from_url(subject_url),
                reactions: BTreeMap::new(),
            });
        };

        let labels = entry.reactions.iter().map(|(label, urls)| async move {
            (label.clone(), self.user_ids(urls).await)
        });
        let reactions = join_all(labels).await.into_iter().collect();

        Ok(ReactionsForSubject {
            subject: entry
                .subject
                .unwrap_or_else(|| SubjectSummary::from_url(subject_url)),
            reactions,
        })
    }

    /// Thread items exactly as indexed
    pub async fn get_replies_for_subject(&self, subject_url: &str) -> Result<Vec<ThreadItem>> {
        Ok(self
            .index
            .thread(subject_url)?
            .map(|entry| entry.items)
            .unwrap_or_default())
    }

    pub async fn get_reply_count(&self, subject_url: &str) -> Result<usize> {
        Ok(self.get_replies_for_subject(subject_url).await?.len())
    }

    pub async fn get_follower_ids(&self, subject_user_id: &Identity) -> Result<Vec<Identity>> {
        Ok(self
            .index
            .follows(subject_user_id)?
            .map(|entry| entry.follower_ids)
            .unwrap_or_default())
    }

    async fn user_ids(&self, urls: &[String]) -> Vec<Identity> {
        resolve_all(
            urls.iter()
                .map(|url| fetch_user_id(self.directory.as_ref(), url)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::index::{
        FollowsIndexEntry, IndexEntry, ReactionsIndexEntry, ThreadIndexEntry, VotesIndexEntry,
    };
    use crate::partition::Partition;
    use chrono::{TimeZone, Utc};

    fn reader() -> (AggregateReader, IndexStore) {
        let partition = Partition::temporary("server@example.com", "hyper://server").unwrap();
        let index = IndexStore::new(Arc::new(partition));
        let directory = StaticDirectory::new();
        directory.register("id:A", "A");
        directory.register("id:C", "C");
        directory.register("id:D", "D");
        directory.register("id:E", "E");
        directory.register("id:F", "F");
        (AggregateReader::new(index.clone(), Arc::new(directory)), index)
    }

    #[tokio::test]
    async fn test_absent_entries_are_empty() {
        let (reader, _) = reader();

        let votes = reader.get_votes_for_subject("https://x/1").await.unwrap();
        assert_eq!(votes.subject_url, "https://x/1");
        assert!(votes.upvoter_ids.is_empty() && votes.downvoter_ids.is_empty());

        let reactions = reader.get_reactions_for_subject("https://x/1").await.unwrap();
        assert_eq!(reactions.subject, SubjectSummary::from_url("https://x/1"));
        assert!(reactions.reactions.is_empty());

        assert!(reader.get_replies_for_subject("https://x/1").await.unwrap().is_empty());
        assert_eq!(reader.get_reply_count("https://x/1").await.unwrap(), 0);
        assert!(reader
            .get_follower_ids(&Identity::from("A"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_voters_dropped() {
        let (reader, index) = reader();
        index
            .write_entry(
                "https://x/1",
                &IndexEntry::Votes(VotesIndexEntry {
                    subject: None,
                    upvote_urls: vec!["id:A".into(), "id:B".into()],
                    downvote_urls: vec![],
                }),
            )
            .unwrap();

        let votes = reader.get_votes_for_subject("https://x/1").await.unwrap();
        assert_eq!(votes.upvoter_ids, vec![Identity::from("A")]);
        assert!(votes.downvoter_ids.is_empty());
    }

    #[tokio::test]
    async fn test_reactions_keep_resolvable_reactors() {
        let (reader, index) = reader();
        let mut map = BTreeMap::new();
        map.insert(
            "like".to_string(),
            vec!["id:C", "id:D", "id:gone", "id:E", "id:F"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        map.insert("sad".to_string(), vec!["id:gone".to_string()]);
        index
            .write_entry(
                "https://x/1",
                &IndexEntry::Reactions(ReactionsIndexEntry {
                    subject: Some(SubjectSummary {
                        db_url: "https://x/1".into(),
                        author_id: Some(Identity::from("A")),
                    }),
                    reactions: map,
                }),
            )
            .unwrap();

        let result = reader.get_reactions_for_subject("https://x/1").await.unwrap();
        assert_eq!(result.subject.author_id, Some(Identity::from("A")));
        assert_eq!(
            result.reactions["like"],
            vec!["C", "D", "E", "F"]
                .into_iter()
                .map(Identity::from)
                .collect::<Vec<_>>()
        );
        assert!(result.reactions["sad"].is_empty());
    }

    #[tokio::test]
    async fn test_replies_and_count() {
        let (reader, index) = reader();
        let items: Vec<ThreadItem> = (0..3)
            .map(|i| ThreadItem {
                db_url: format!("hyper://a/ctzn.network/comment/{i}"),
                author_id: Some(Identity::from("A")),
                created_at: Utc.timestamp_millis_opt(1_000 + i).single(),
            })
            .collect();
        index
            .write_entry(
                "https://x/1",
                &IndexEntry::Thread(ThreadIndexEntry {
                    subject: None,
                    items: items.clone(),
                }),
            )
            .unwrap();

        assert_eq!(reader.get_replies_for_subject("https://x/1").await.unwrap(), items);
        assert_eq!(reader.get_reply_count("https://x/1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_follower_ids() {
        let (reader, index) = reader();
        index
            .write_entry(
                "A",
                &IndexEntry::Follows(FollowsIndexEntry {
                    subject_id: Some(Identity::from("A")),
                    follower_ids: vec![Identity::from("C"), Identity::from("D")],
                }),
            )
            .unwrap();
        assert_eq!(
            reader.get_follower_ids(&Identity::from("A")).await.unwrap(),
            vec![Identity::from("C"), Identity::from("D")]
        );
    }
}
