//! Notification pagination
//!
//! Notifications for a user sit in the notification index under
//! `{identity}:{lexint ms}{discriminator}`. A page is a reverse scan of the
//! user's key window; every entry is then projected onto the item it names.
//! The emitted `key` is the part after the identity prefix so callers can
//! pass it straight back as `lt` (older) or `gt` (newer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::authors::{Author, AuthorMemo, AuthorResolver};
use crate::directory::IdentityDirectory;
use crate::error::Result;
use crate::fanout::resolve_all;
use crate::index::{parse_timestamp, IndexStore, NotificationRecord};
use crate::lexint;
use crate::partition::KeyRange;
use crate::reference::{parse_entry_url, parse_pointer, EntryUrl};
use crate::registry::PartitionRegistry;
use crate::types::Identity;

/// Largest page, also the page size when none is given
pub const MAX_PAGE_SIZE: usize = 20;

/// Page bounds. `lt`/`gt` are emitted keys; `before`/`after` are times and
/// only apply when the matching key bound is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationQuery {
    pub lt: Option<String>,
    pub gt: Option<String>,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl NotificationQuery {
    /// Requested limit clamped to `1..=20`; absent or zero means 20
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => MAX_PAGE_SIZE,
            Some(n) => n.clamp(1, MAX_PAGE_SIZE as i64) as usize,
        }
    }

    /// Key window of `user` for this query
    pub fn window(&self, user: &Identity) -> KeyRange {
        let lt = self
            .lt
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| self.before.as_ref().map(lexint::encode_time));
        let gt = self
            .gt
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| self.after.as_ref().map(lexint::encode_time));

        let mut range = KeyRange::all();
        if let Some(lt) = lt {
            range = range.lt(lt);
        }
        if let Some(gt) = gt {
            range = range.gt(gt);
        }
        range.with_prefix(user.as_str())
    }
}

/// A notification projected onto its item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub key: String,
    pub item_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub blended_created_at: Option<DateTime<Utc>>,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<serde_json::Value>,
}

/// Resolved pieces of one notification, before authors are filled in
struct Resolved {
    record: NotificationRecord,
    owner: Identity,
    item: Option<serde_json::Value>,
}

pub struct NotificationEngine {
    index: IndexStore,
    registry: Arc<PartitionRegistry>,
    directory: Arc<dyn IdentityDirectory>,
    authors: Arc<AuthorResolver>,
}

impl NotificationEngine {
    pub fn new(
        index: IndexStore,
        registry: Arc<PartitionRegistry>,
        directory: Arc<dyn IdentityDirectory>,
        authors: Arc<AuthorResolver>,
    ) -> Self {
        Self {
            index,
            registry,
            directory,
            authors,
        }
    }

    fn page(&self, user: &Identity, query: &NotificationQuery) -> Result<Vec<NotificationRecord>> {
        self.index
            .notifications_for(user, &query.window(user), query.effective_limit())
    }

    /// Newest-first page of notifications for `user`
    pub async fn get_notifications(
        &self,
        user: &Identity,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>> {
        let records = self.page(user, query)?;
        let scanned = records.len();

        let resolved = resolve_all(records.into_iter().map(|record| self.resolve(record))).await;

        let mut memo = AuthorMemo::new();
        let notifications: Vec<Notification> = resolved
            .into_iter()
            .map(|r| {
                let author = self.authors.fetch_author(&r.owner, Some(&mut memo));
                project(r, author)
            })
            .collect();

        debug!(
            user = %user,
            scanned,
            returned = notifications.len(),
            "Fetched notifications"
        );
        Ok(notifications)
    }

    /// Number of entries `get_notifications` would scan for the same query
    pub async fn count_notifications(&self, user: &Identity, query: &NotificationQuery) -> Result<usize> {
        self.index
            .count_notifications_for(user, &query.window(user), query.effective_limit())
    }

    async fn resolve(&self, record: NotificationRecord) -> Result<Option<Resolved>> {
        let pointer = match parse_pointer(&record.entry.item_url) {
            Ok(pointer) => pointer,
            Err(e) => {
                debug!(key = %record.key, error = %e, "Unparseable notification item");
                return Ok(None);
            }
        };
        let owner = match self.directory.lookup(&pointer.origin).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!(origin = %pointer.origin, error = %e, "Notification origin lookup failed");
                return Ok(None);
            }
        };

        // too few segments for a schema id and key: keep the notification, no item
        let item = parse_entry_url(&record.entry.item_url)
            .ok()
            .and_then(|url| self.read_item(&owner, &url));

        Ok(Some(Resolved {
            record,
            owner,
            item,
        }))
    }

    /// Item named by an entry URL, from the owner's cached partition only
    fn read_item(&self, owner: &Identity, url: &EntryUrl) -> Option<serde_json::Value> {
        let partition = self.registry.get(owner)?;
        partition
            .table(&url.schema_id)
            .and_then(|table| table.get(&url.key))
            .map_err(|e| debug!(owner = %owner, error = %e, "Notification item read failed"))
            .ok()
            .flatten()
            .map(|entry| entry.value)
    }
}

fn project(resolved: Resolved, author: Author) -> Notification {
    let Resolved {
        record,
        owner: _,
        item,
    } = resolved;

    let created_at = record.entry.created_at;
    let item_created_at = item
        .as_ref()
        .and_then(|value| value.get("createdAt"))
        .and_then(parse_timestamp);
    let blended_created_at = match (item_created_at, created_at) {
        (Some(item_at), Some(entry_at)) => Some(item_at.min(entry_at)),
        _ => created_at,
    };

    Notification {
        key: short_key(&record.key).to_string(),
        item_url: record.entry.item_url,
        created_at,
        blended_created_at,
        author,
        item,
    }
}

/// Part of an index key after its identity prefix
fn short_key(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, tail)| tail)
}
