//! Pointer URLs and references
//!
//! A pointer URL names one record in one partition:
//!
//! ```text
//! hyper://<partition-key>/<collection>/.../<key>
//! hyper://<partition-key>/ctzn.network/vote/<url-encoded subject>
//! ```
//!
//! The host identifies the owning partition (after mapping the origin to an
//! identity), the path segments are nested sub-collections and the last
//! segment is the leaf key.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{IndexError, Result};
use crate::types::Identity;

/// Pointer to one record inside exactly one partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub identity: Identity,
    pub table_id: String,
    pub key: String,
}

impl Reference {
    pub fn new(identity: impl Into<Identity>, table_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            table_id: table_id.into(),
            key: key.into(),
        }
    }
}

/// A pointer URL split into origin and decoded path segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerPath {
    /// `scheme://host[:port]/`
    pub origin: String,
    /// Percent-decoded, non-empty path segments
    pub segments: Vec<String>,
}

impl PointerPath {
    /// Leaf key (last segment)
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Sub-collection path (every segment but the last)
    pub fn collection(&self) -> &[String] {
        match self.segments.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

/// An entry URL: origin, two-segment schema id and key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryUrl {
    pub origin: String,
    pub schema_id: String,
    pub key: String,
}

/// Split a pointer URL into origin and decoded path segments
pub fn parse_pointer(pointer: &str) -> Result<PointerPath> {
    let url = Url::parse(pointer)
        .map_err(|e| IndexError::InvalidArgument(format!("Invalid pointer URL {}: {}", pointer, e)))?;
    let origin = url_origin(&url)
        .ok_or_else(|| IndexError::InvalidArgument(format!("Pointer URL has no host: {}", pointer)))?;

    let mut segments = Vec::new();
    for raw in url.path_segments().into_iter().flatten() {
        if raw.is_empty() {
            continue;
        }
        let decoded = urlencoding::decode(raw).map_err(|e| {
            IndexError::InvalidArgument(format!("Invalid path segment in {}: {}", pointer, e))
        })?;
        segments.push(decoded.into_owned());
    }

    Ok(PointerPath { origin, segments })
}

/// Parse `scheme://host/<domain>/<name>/<key>` into an [`EntryUrl`]
pub fn parse_entry_url(entry_url: &str) -> Result<EntryUrl> {
    let pointer = parse_pointer(entry_url)?;
    if pointer.segments.len() < 3 {
        return Err(IndexError::InvalidArgument(format!(
            "Entry URL needs a schema id and a key: {}",
            entry_url
        )));
    }
    Ok(EntryUrl {
        origin: pointer.origin,
        schema_id: format!("{}/{}", pointer.segments[0], pointer.segments[1]),
        key: pointer.segments[2..].join("/"),
    })
}

/// Build the URL of a record in a partition
pub fn construct_entry_url(db_url: &str, schema_id: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        db_url.trim_end_matches('/'),
        schema_id,
        urlencoding::encode(key)
    )
}

/// Canonical URL for a user. `name@host` identities use their own host.
pub fn construct_user_url(user_id: &Identity, fallback_domain: &str) -> String {
    let domain = user_id.domain().unwrap_or(fallback_domain);
    format!("https://{}/{}", domain, user_id)
}

/// `scheme://host[:port]/` of a URL that has a host
pub(crate) fn url_origin(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pointer_nested() {
        let p = parse_pointer("hyper://abc123/comments/2021%2F01/post-1").unwrap();
        assert_eq!(p.origin, "hyper://abc123/");
        assert_eq!(p.segments, vec!["comments", "2021/01", "post-1"]);
        assert_eq!(p.key(), Some("post-1"));
        assert_eq!(p.collection(), &["comments".to_string(), "2021/01".to_string()]);
    }

    #[test]
    fn test_parse_pointer_requires_host() {
        assert!(matches!(parse_pointer("id:A"), Err(IndexError::InvalidArgument(_))));
        assert!(matches!(parse_pointer("not a url"), Err(IndexError::InvalidArgument(_))));
    }

    #[test]
    fn test_entry_url_round_trip_with_url_key() {
        let url = construct_entry_url("hyper://abc/", "ctzn.network/vote", "https://x.com/post/1");
        assert_eq!(url, "hyper://abc/ctzn.network/vote/https%3A%2F%2Fx.com%2Fpost%2F1");

        let parsed = parse_entry_url(&url).unwrap();
        assert_eq!(parsed.origin, "hyper://abc/");
        assert_eq!(parsed.schema_id, "ctzn.network/vote");
        assert_eq!(parsed.key, "https://x.com/post/1");
    }

    #[test]
    fn test_entry_url_needs_key() {
        assert!(parse_entry_url("hyper://abc/ctzn.network/vote").is_err());
    }

    #[test]
    fn test_user_url() {
        assert_eq!(
            construct_user_url(&Identity::from("alice@example.com"), "fallback.org"),
            "https://example.com/alice@example.com"
        );
        assert_eq!(
            construct_user_url(&Identity::from("bob"), "fallback.org"),
            "https://fallback.org/bob"
        );
    }

    #[test]
    fn test_origin_keeps_port() {
        let p = parse_pointer("http://localhost:8080/t/k").unwrap();
        assert_eq!(p.origin, "http://localhost:8080/");
    }
}
