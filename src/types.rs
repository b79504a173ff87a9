//! Shared types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable opaque identifier of a participant. Owns exactly one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host part of an `name@host` identity
    pub fn domain(&self) -> Option<&str> {
        self.0
            .rsplit_once('@')
            .map(|(_, host)| host)
            .filter(|host| !host.is_empty())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Denormalised summary of the thing an activity points at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    #[serde(default)]
    pub db_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Identity>,
}

impl SubjectSummary {
    /// Summary carrying only the subject URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            db_url: url.into(),
            author_id: None,
        }
    }
}
