//! Keyed tables inside a partition

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::range::KeyRange;
use crate::error::{IndexError, Result};
use crate::types::Identity;

/// A stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: serde_json::Value,
}

/// Ordered key→value collection backed by one sled tree
#[derive(Clone)]
pub struct Table {
    name: String,
    owner: Identity,
    writable: bool,
    tree: sled::Tree,
}

impl Table {
    pub(crate) fn new(name: String, owner: Identity, writable: bool, tree: sled::Tree) -> Self {
        Self {
            name,
            owner,
            writable,
            tree,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read a record. `None` means the key does not exist.
    pub fn get(&self, key: &str) -> Result<Option<Entry>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(Entry {
                key: key.to_string(),
                value: decode_value(&bytes)?,
            })),
            None => Ok(None),
        }
    }

    /// Read a record into a concrete type
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => rmp_serde::from_slice(&bytes)
                .map(Some)
                .map_err(|e| IndexError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Write a record, replacing any previous value under the key
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.ensure_writable()?;
        let bytes =
            rmp_serde::to_vec_named(value).map_err(|e| IndexError::Serialization(e.to_string()))?;
        self.tree.insert(key.as_bytes(), bytes)?;
        debug!(table = %self.name, key = %key, "Record written");
        Ok(())
    }

    /// Delete a record. Returns whether it existed.
    pub fn del(&self, key: &str) -> Result<bool> {
        self.ensure_writable()?;
        Ok(self.tree.remove(key.as_bytes())?.is_some())
    }

    /// Scan records inside `range`, at most `limit` of them
    pub fn range(&self, range: &KeyRange, limit: usize, reverse: bool) -> Result<Vec<Entry>> {
        self.range_raw(range, limit, reverse, |_| true)?
            .into_iter()
            .map(|(key, bytes)| {
                Ok(Entry {
                    key,
                    value: decode_value(&bytes)?,
                })
            })
            .collect()
    }

    /// Scan undecoded values inside `range`. Keys rejected by `keep` are
    /// skipped and do not count towards `limit`.
    pub fn range_raw<F>(
        &self,
        range: &KeyRange,
        limit: usize,
        reverse: bool,
        keep: F,
    ) -> Result<Vec<(String, sled::IVec)>>
    where
        F: Fn(&str) -> bool,
    {
        if range.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let iter = self.tree.range::<Vec<u8>, _>(range.bounds());
        let items: Box<dyn Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>> = if reverse {
            Box::new(iter.rev())
        } else {
            Box::new(iter)
        };

        let mut entries = Vec::new();
        for item in items {
            if entries.len() >= limit {
                break;
            }
            let (key, value) = item?;
            let key = String::from_utf8_lossy(&key).into_owned();
            if keep(&key) {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Read an undecoded value
    pub fn get_raw(&self, key: &str) -> Result<Option<sled::IVec>> {
        Ok(self.tree.get(key.as_bytes())?)
    }

    /// Count keys inside `range`, at most `limit`, without decoding values
    pub fn count(&self, range: &KeyRange, limit: usize) -> Result<usize> {
        self.count_where(range, limit, |_| true)
    }

    /// Count keys inside `range` accepted by `keep`, at most `limit`
    pub fn count_where<F>(&self, range: &KeyRange, limit: usize, keep: F) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        if range.is_empty() {
            return Ok(0);
        }
        let mut count = 0;
        for item in self.tree.range::<Vec<u8>, _>(range.bounds()) {
            if count >= limit {
                break;
            }
            let (key, _) = item?;
            if keep(&String::from_utf8_lossy(&key)) {
                count += 1;
            }
        }
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(IndexError::ReadOnly(format!("{} ({})", self.owner, self.name)))
        }
    }
}

pub(crate) fn decode_value(bytes: &[u8]) -> Result<serde_json::Value> {
    rmp_serde::from_slice(bytes).map_err(|e| IndexError::Serialization(e.to_string()))
}
