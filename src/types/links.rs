//! Typed links recorded in a document's metadata envelope.
//!
//! Links are the edges of the crawl graph. Each processed document carries a
//! map from link name to a tagged link value:
//!
//! - `self` - canonical identity of this document (exactly one)
//! - `siblings` - the collection URN this document belongs to (at most one)
//! - `resource` - singular reference(s) to another document
//! - `collection` - subordinate multi-document set owned by this document
//! - `relation` - non-owned association to a set

use serde::{Deserialize, Serialize};

use super::urn::Urn;

/// One or many link targets.
///
/// Most resource links point at a single URN; a few (issue assignees, the
/// per-page `resources` link of a relation traversal) point at an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Href {
    One(Urn),
    Many(Vec<Urn>),
}

impl From<Urn> for Href {
    fn from(urn: Urn) -> Self {
        Href::One(urn)
    }
}

impl From<Vec<Urn>> for Href {
    fn from(urns: Vec<Urn>) -> Self {
        Href::Many(urns)
    }
}

/// A tagged link value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkValue {
    /// Canonical identity of this document.
    #[serde(rename = "self")]
    SelfLink { href: Urn },

    /// The collection this document belongs to.
    Siblings { href: Urn },

    /// Singular reference(s) to another document.
    Resource { href: Href },

    /// Owned multi-document set.
    Collection { href: Urn },

    /// Non-owned association to a set.
    Relation { href: Urn },
}

impl LinkValue {
    /// Returns the single URN target, if this link has exactly one.
    pub fn href(&self) -> Option<&Urn> {
        match self {
            LinkValue::SelfLink { href }
            | LinkValue::Siblings { href }
            | LinkValue::Collection { href }
            | LinkValue::Relation { href } => Some(href),
            LinkValue::Resource {
                href: Href::One(href),
            } => Some(href),
            LinkValue::Resource { .. } => None,
        }
    }

    /// Returns all URN targets of this link.
    pub fn hrefs(&self) -> Vec<&Urn> {
        match self {
            LinkValue::Resource {
                href: Href::Many(urns),
            } => urns.iter().collect(),
            other => other.href().into_iter().collect(),
        }
    }
}
