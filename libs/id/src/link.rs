//! Document links.

use std::fmt;
use std::str::FromStr;

use crate::IdError;

/// Address of a document in the store: `{collection}/{id}`.
///
/// The collection part always starts with `/` and may contain several path
/// segments (`/resources/pools`); the id is the final segment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentLink(String);

impl DocumentLink {
    /// Builds a link from a collection path and a document id.
    pub fn new(collection: &str, id: &str) -> Self {
        Self(format!("{}/{}", collection.trim_end_matches('/'), id))
    }

    /// Parses and validates a link.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if !s.starts_with('/') {
            return Err(IdError::InvalidLink(s.to_string()));
        }
        match s.rsplit_once('/') {
            Some((collection, id)) if !collection.is_empty() && !id.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(IdError::InvalidLink(s.to_string())),
        }
    }

    /// Collection path of the link, without the trailing id.
    pub fn collection(&self) -> &str {
        self.0.rsplit_once('/').map(|(c, _)| c).unwrap_or("")
    }

    /// Final path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, id)| id).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentLink {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DocumentLink {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for DocumentLink {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for DocumentLink {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
