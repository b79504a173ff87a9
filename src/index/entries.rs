//! Secondary-index entry schemas
//!
//! Index values are written by an external maintainer and may be stale,
//! partial or malformed. Every field has a default and list decoders drop
//! elements they cannot read instead of failing the whole entry.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{Identity, SubjectSummary};

/// Which index a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Votes,
    Reactions,
    Thread,
    Follows,
    Notifications,
}

impl IndexKind {
    /// Table holding this index inside the server partition
    pub fn table_id(&self) -> &'static str {
        match self {
            IndexKind::Votes => "ctzn.network/votes-idx",
            IndexKind::Reactions => "ctzn.network/reactions-idx",
            IndexKind::Thread => "ctzn.network/thread-idx",
            IndexKind::Follows => "ctzn.network/follow-idx",
            IndexKind::Notifications => "ctzn.network/notification-idx",
        }
    }
}

/// Upvote and downvote pointers for one subject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VotesIndexEntry {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subject: Option<SubjectSummary>,
    #[serde(deserialize_with = "lenient_vec")]
    pub upvote_urls: Vec<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub downvote_urls: Vec<String>,
}

/// Reaction label → pointers of the records carrying that reaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionsIndexEntry {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subject: Option<SubjectSummary>,
    #[serde(deserialize_with = "lenient_reactions")]
    pub reactions: BTreeMap<String, Vec<String>>,
}

/// One reply in a thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadItem {
    pub db_url: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub author_id: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Ordered replies to one subject
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadIndexEntry {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subject: Option<SubjectSummary>,
    #[serde(deserialize_with = "lenient_vec")]
    pub items: Vec<ThreadItem>,
}

/// Followers of one identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FollowsIndexEntry {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subject_id: Option<Identity>,
    #[serde(deserialize_with = "lenient_vec")]
    pub follower_ids: Vec<Identity>,
}

/// One notification for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationIndexEntry {
    pub item_url: String,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_option")]
    pub subject_url: Option<String>,
}

/// A decoded index value, tagged by index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    Votes(VotesIndexEntry),
    Reactions(ReactionsIndexEntry),
    Thread(ThreadIndexEntry),
    Follows(FollowsIndexEntry),
    Notification(NotificationIndexEntry),
}

impl IndexEntry {
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexEntry::Votes(_) => IndexKind::Votes,
            IndexEntry::Reactions(_) => IndexKind::Reactions,
            IndexEntry::Thread(_) => IndexKind::Thread,
            IndexEntry::Follows(_) => IndexKind::Follows,
            IndexEntry::Notification(_) => IndexKind::Notifications,
        }
    }

    /// Decode a raw value. Malformed values decode to the kind's default.
    pub fn decode(kind: IndexKind, value: serde_json::Value) -> Self {
        match kind {
            IndexKind::Votes => IndexEntry::Votes(decode_or_default(kind, value)),
            IndexKind::Reactions => IndexEntry::Reactions(decode_or_default(kind, value)),
            IndexKind::Thread => IndexEntry::Thread(decode_or_default(kind, value)),
            IndexKind::Follows => IndexEntry::Follows(decode_or_default(kind, value)),
            IndexKind::Notifications => IndexEntry::Notification(decode_or_default(kind, value)),
        }
    }

    /// Value as stored in the index
    pub fn to_value(&self) -> serde_json::Value {
        let encoded = match self {
            IndexEntry::Votes(e) => serde_json::to_value(e),
            IndexEntry::Reactions(e) => serde_json::to_value(e),
            IndexEntry::Thread(e) => serde_json::to_value(e),
            IndexEntry::Follows(e) => serde_json::to_value(e),
            IndexEntry::Notification(e) => serde_json::to_value(e),
        };
        encoded.unwrap_or_default()
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(kind: IndexKind, value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!(index = ?kind, error = %e, "Malformed index entry, using defaults");
        T::default()
    })
}

// ============================================================================
// Lenient field decoders
// ============================================================================

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_reactions<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Object(map) = value else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(label, urls)| match urls {
            serde_json::Value::Array(items) => Some((
                label,
                items
                    .into_iter()
                    .filter_map(|u| u.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        })
        .collect())
}

/// RFC 3339 string or Unix milliseconds
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value))
}

/// Read a timestamp from a loosely typed value
pub fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
