//! Partitions - per-identity keyed stores
//!
//! A partition is one sled database owned by exactly one identity. Each named
//! sub-collection is a sled tree; nested paths share one tree whose name is
//! the path segments joined by NUL. Blobs live in their own tree.
//!
//! ```text
//! partition (sled::Db)
//! ├── __meta                  identity, origin
//! ├── __blobs                 name → bytes
//! ├── __root                  keys outside any sub-collection
//! ├── ctzn.network\0profile   self → {displayName, ...}
//! └── ctzn.network\0vote      subjectUrl → vote
//! ```
//!
//! Schema ids such as `ctzn.network/vote` open the nested path
//! `ctzn.network` → `vote`.

pub mod range;
pub mod table;

pub use range::KeyRange;
pub use table::{Entry, Table};

use std::path::Path;
use tracing::info;

use crate::error::{IndexError, Result};
use crate::types::Identity;

/// Profile records of a partition owner
pub const PROFILE_TABLE: &str = "ctzn.network/profile";

/// Votes cast by the partition owner, keyed by subject URL
pub const VOTES_TABLE: &str = "ctzn.network/vote";

const META_TREE: &str = "__meta";
const BLOBS_TREE: &str = "__blobs";
const ROOT_TREE: &str = "__root";
const SUB_SEPARATOR: &str = "\0";

/// A participant's exclusively owned store
#[derive(Clone)]
pub struct Partition {
    identity: Identity,
    origin: String,
    writable: bool,
    db: sled::Db,
}

impl Partition {
    /// Initialise a partition in an opened database, recording its owner
    pub fn create(db: sled::Db, identity: Identity, origin: impl Into<String>) -> Result<Self> {
        let origin = normalize_origin(&origin.into());
        let meta = db.open_tree(META_TREE)?;
        meta.insert("identity", identity.as_str().as_bytes())?;
        meta.insert("origin", origin.as_bytes())?;
        Ok(Self {
            identity,
            origin,
            writable: true,
            db,
        })
    }

    /// Open an existing partition from disk
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: u64) -> Result<Self> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(cache_capacity)
            .open()?;
        Self::from_existing(db, path.as_ref())
    }

    fn from_existing(db: sled::Db, path: &Path) -> Result<Self> {
        let meta = db.open_tree(META_TREE)?;
        let read = |key: &str| -> Result<String> {
            meta.get(key)?
                .map(|v| String::from_utf8_lossy(&v).into_owned())
                .ok_or_else(|| {
                    IndexError::NotFound(format!(
                        "Partition metadata '{}' in {}",
                        key,
                        path.display()
                    ))
                })
        };
        let identity = Identity::new(read("identity")?);
        let origin = read("origin")?;
        info!(identity = %identity, path = %path.display(), "Opened partition");
        Ok(Self {
            identity,
            origin,
            writable: true,
            db,
        })
    }

    /// Open the partition at `path`, initialising it for `identity` if new
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        identity: Identity,
        origin: impl Into<String>,
        cache_capacity: u64,
    ) -> Result<Self> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(cache_capacity)
            .open()?;
        let existing = db.open_tree(META_TREE)?.get("identity")?;
        match existing {
            Some(owner) if &owner[..] != identity.as_str().as_bytes() => {
                Err(IndexError::Config(format!(
                    "{} belongs to {}, not {}",
                    path.as_ref().display(),
                    String::from_utf8_lossy(&owner),
                    identity
                )))
            }
            Some(_) => Self::from_existing(db, path.as_ref()),
            None => Self::create(db, identity, origin),
        }
    }

    /// Create a throwaway in-memory partition
    pub fn temporary(identity: impl Into<Identity>, origin: impl Into<String>) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::create(db, identity.into(), origin)
    }

    /// Mark this handle read-only. Used for partitions owned elsewhere.
    pub fn into_read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Network origin, e.g. `hyper://abc/`
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Base URL for entry URLs (origin without trailing slash)
    pub fn url(&self) -> &str {
        self.origin.trim_end_matches('/')
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Open a table by schema id. `ctzn.network/vote` is the nested
    /// sub-collection `ctzn.network` → `vote`.
    pub fn table(&self, schema_id: &str) -> Result<Table> {
        let path: Vec<&str> = schema_id.split('/').collect();
        self.sub(&path)
    }

    /// Open a nested sub-collection
    pub fn sub<S: AsRef<str>>(&self, path: &[S]) -> Result<Table> {
        if path.is_empty() || path.iter().any(|s| s.as_ref().is_empty()) {
            return Err(IndexError::InvalidArgument(
                "Sub-collection path must not be empty".into(),
            ));
        }
        let segments: Vec<&str> = path.iter().map(|s| s.as_ref()).collect();
        let tree_name = segments.join(SUB_SEPARATOR);
        if [META_TREE, BLOBS_TREE, ROOT_TREE].contains(&tree_name.as_str()) {
            return Err(IndexError::InvalidArgument(format!(
                "Reserved sub-collection name: {}",
                tree_name
            )));
        }
        let tree = self.db.open_tree(tree_name.as_bytes())?;
        Ok(Table::new(
            segments.join("/"),
            self.identity.clone(),
            self.writable,
            tree,
        ))
    }

    /// Records stored directly under the partition, outside any sub-collection
    pub fn root(&self) -> Result<Table> {
        let tree = self.db.open_tree(ROOT_TREE)?;
        Ok(Table::new(
            String::new(),
            self.identity.clone(),
            self.writable,
            tree,
        ))
    }

    /// Read a named blob
    pub fn get_blob(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.db.open_tree(BLOBS_TREE)?;
        Ok(blobs.get(name.as_bytes())?.map(|v| v.to_vec()))
    }

    /// Store a named blob
    pub fn put_blob(&self, name: &str, data: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(IndexError::ReadOnly(format!("{} (blobs)", self.identity)));
        }
        let blobs = self.db.open_tree(BLOBS_TREE)?;
        blobs.insert(name.as_bytes(), data)?;
        Ok(())
    }

    /// Flush changes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("identity", &self.identity)
            .field("origin", &self.origin)
            .field("writable", &self.writable)
            .finish()
    }
}

fn normalize_origin(origin: &str) -> String {
    if origin.ends_with('/') {
        origin.to_string()
    } else {
        format!("{}/", origin)
    }
}
