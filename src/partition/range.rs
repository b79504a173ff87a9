//! Key ranges for ordered scans

use std::ops::Bound;

/// Upper sentinel: sorts after every key sharing a prefix
pub const MAX_SENTINEL: u8 = 0xff;

/// Lower sentinel: sorts before every key sharing a prefix
pub const MIN_SENTINEL: u8 = 0x00;

/// Separator between a key prefix and the rest of the key
pub const PREFIX_SEPARATOR: u8 = b':';

/// Bounds for a range scan over raw keys.
///
/// When both an exclusive and an inclusive bound are given on the same
/// side, the exclusive one is used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub lt: Option<Vec<u8>>,
    pub lte: Option<Vec<u8>>,
    pub gt: Option<Vec<u8>>,
    pub gte: Option<Vec<u8>>,
}

impl KeyRange {
    /// Unbounded range
    pub fn all() -> Self {
        Self::default()
    }

    pub fn lt(mut self, key: impl AsRef<[u8]>) -> Self {
        self.lt = Some(key.as_ref().to_vec());
        self
    }

    pub fn lte(mut self, key: impl AsRef<[u8]>) -> Self {
        self.lte = Some(key.as_ref().to_vec());
        self
    }

    pub fn gt(mut self, key: impl AsRef<[u8]>) -> Self {
        self.gt = Some(key.as_ref().to_vec());
        self
    }

    pub fn gte(mut self, key: impl AsRef<[u8]>) -> Self {
        self.gte = Some(key.as_ref().to_vec());
        self
    }

    /// Confine the range to keys of the form `{prefix}:...`.
    ///
    /// Given bounds become `{prefix}:{bound}`. A missing upper bound becomes
    /// `{prefix}:\xff` and a missing lower bound `{prefix}:\x00`, so a scan
    /// never leaves the prefix even over a shared index.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let prefixed = |bound: &Option<Vec<u8>>| bound.as_ref().map(|b| prefixed_key(prefix, b));
        let mut range = KeyRange {
            lt: prefixed(&self.lt),
            lte: prefixed(&self.lte),
            gt: prefixed(&self.gt),
            gte: prefixed(&self.gte),
        };
        if range.lt.is_none() && range.lte.is_none() {
            range.lt = Some(prefixed_key(prefix, &[MAX_SENTINEL]));
        }
        if range.gt.is_none() && range.gte.is_none() {
            range.gt = Some(prefixed_key(prefix, &[MIN_SENTINEL]));
        }
        range
    }

    /// Lower and upper bounds in the form sled expects
    pub(crate) fn bounds(&self) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
        let lower = match (&self.gt, &self.gte) {
            (Some(gt), _) => Bound::Excluded(gt.clone()),
            (None, Some(gte)) => Bound::Included(gte.clone()),
            (None, None) => Bound::Unbounded,
        };
        let upper = match (&self.lt, &self.lte) {
            (Some(lt), _) => Bound::Excluded(lt.clone()),
            (None, Some(lte)) => Bound::Included(lte.clone()),
            (None, None) => Bound::Unbounded,
        };
        (lower, upper)
    }

    /// True when no key can satisfy both bounds
    pub(crate) fn is_empty(&self) -> bool {
        match self.bounds() {
            (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
            (Bound::Included(lo), Bound::Excluded(hi))
            | (Bound::Excluded(lo), Bound::Included(hi))
            | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
            _ => false,
        }
    }
}

fn prefixed_key(prefix: &str, rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + rest.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(PREFIX_SEPARATOR);
    key.extend_from_slice(rest);
    key
}
