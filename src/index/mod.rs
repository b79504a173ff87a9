//! Read access to the secondary indexes
//!
//! The indexes live in the server's own partition, one table per index kind.
//! They are maintained elsewhere; this module only reads them and, for
//! tooling and tests, writes raw entries.
//!
//! ```text
//! server partition
//! ├── ctzn.network/votes-idx         subject url  → VotesIndexEntry
//! ├── ctzn.network/reactions-idx     subject url  → ReactionsIndexEntry
//! ├── ctzn.network/thread-idx        subject url  → ThreadIndexEntry
//! ├── ctzn.network/follow-idx        identity     → FollowsIndexEntry
//! └── ctzn.network/notification-idx  {identity}:{lexint ms}{disc} → NotificationIndexEntry
//! ```

mod entries;

pub use entries::{
    parse_timestamp, FollowsIndexEntry, IndexEntry, IndexKind, NotificationIndexEntry,
    ReactionsIndexEntry, ThreadIndexEntry, ThreadItem, VotesIndexEntry,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::Result;
use crate::lexint;
use crate::partition::table::decode_value;
use crate::partition::{KeyRange, Partition, Table};
use crate::types::Identity;

/// Key of one notification in the notification index. The discriminator
/// must not contain `:`.
pub fn notification_key(user: &Identity, created_at: &DateTime<Utc>, discriminator: &str) -> String {
    format!("{}:{}{}", user, lexint::encode_time(created_at), discriminator)
}

/// Whether `key` is a notification key of `user` rather than of an identity
/// that merely starts with `{user}:`
pub fn is_notification_key_of(user: &Identity, key: &str) -> bool {
    let Some(rest) = key
        .strip_prefix(user.as_str())
        .and_then(|rest| rest.strip_prefix(':'))
    else {
        return false;
    };
    rest.len() >= lexint::ENCODED_WIDTH
        && rest.as_bytes()[..lexint::ENCODED_WIDTH]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
        && !rest[lexint::ENCODED_WIDTH..].contains(':')
}

/// Decode a stored value, treating undecodable bytes as `null`
fn lenient_value(kind: IndexKind, key: &str, bytes: &[u8]) -> serde_json::Value {
    decode_value(bytes).unwrap_or_else(|e| {
        warn!(index = ?kind, key = %key, error = %e, "Undecodable index value");
        serde_json::Value::Null
    })
}

/// A raw notification entry with its index key
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub key: String,
    pub entry: NotificationIndexEntry,
}

/// Typed reader over the index tables of the server partition
#[derive(Debug, Clone)]
pub struct IndexStore {
    partition: Arc<Partition>,
}

impl IndexStore {
    pub fn new(partition: Arc<Partition>) -> Self {
        Self { partition }
    }

    pub fn partition(&self) -> &Arc<Partition> {
        &self.partition
    }

    fn table(&self, kind: IndexKind) -> Result<Table> {
        self.partition.table(kind.table_id())
    }

    /// Raw lookup, decoded leniently
    pub fn get(&self, kind: IndexKind, key: &str) -> Result<Option<IndexEntry>> {
        Ok(self
            .table(kind)?
            .get_raw(key)?
            .map(|bytes| IndexEntry::decode(kind, lenient_value(kind, key, &bytes))))
    }

    pub fn votes(&self, subject_url: &str) -> Result<Option<VotesIndexEntry>> {
        match self.get(IndexKind::Votes, subject_url)? {
            Some(IndexEntry::Votes(entry)) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    pub fn reactions(&self, subject_url: &str) -> Result<Option<ReactionsIndexEntry>> {
        match self.get(IndexKind::Reactions, subject_url)? {
            Some(IndexEntry::Reactions(entry)) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    pub fn thread(&self, subject_url: &str) -> Result<Option<ThreadIndexEntry>> {
        match self.get(IndexKind::Thread, subject_url)? {
            Some(IndexEntry::Thread(entry)) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    pub fn follows(&self, subject_id: &Identity) -> Result<Option<FollowsIndexEntry>> {
        match self.get(IndexKind::Follows, subject_id.as_str())? {
            Some(IndexEntry::Follows(entry)) => Ok(Some(entry)),
            _ => Ok(None),
        }
    }

    /// Newest-first scan of `user`'s notifications within `range`
    pub fn notifications_for(
        &self,
        user: &Identity,
        range: &KeyRange,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>> {
        let kind = IndexKind::Notifications;
        let entries = self
            .table(kind)?
            .range_raw(range, limit, true, |key| is_notification_key_of(user, key))?;
        Ok(entries
            .into_iter()
            .map(|(key, bytes)| {
                let entry = match IndexEntry::decode(kind, lenient_value(kind, &key, &bytes)) {
                    IndexEntry::Notification(entry) => entry,
                    _ => NotificationIndexEntry::default(),
                };
                NotificationRecord { key, entry }
            })
            .collect())
    }

    /// Number of `user`'s notifications within `range`, at most `limit`
    pub fn count_notifications_for(&self, user: &Identity, range: &KeyRange, limit: usize) -> Result<usize> {
        self.table(IndexKind::Notifications)?
            .count_where(range, limit, |key| is_notification_key_of(user, key))
    }

    /// Write one entry under its kind's table
    pub fn write_entry(&self, key: &str, entry: &IndexEntry) -> Result<()> {
        self.table(entry.kind())?.put(key, &entry.to_value())
    }

    pub fn remove_entry(&self, kind: IndexKind, key: &str) -> Result<bool> {
        self.table(kind)?.del(key)
    }
}
