//! Canonical resource identifiers for the crawl graph.
//!
//! Every document the crawler produces is identified by a URN: a `urn:`
//! prefixed, colon-delimited path built by concatenation. The grammar is
//! `urn:<root-type>:<id>(:<segment>:<value>)*`, for example `urn:repo:42`,
//! `urn:repo:42:issues`, or `urn:repo:42:issue:7:issue_comments`.
//!
//! A *qualifier* is the URN prefix a document inherits from its parent in
//! the traversal; children append to it. Root resources (users, orgs, repos,
//! teams) qualify themselves: their qualifier is their own self URN.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an unknown root resource kind.
#[derive(Debug, Clone, Error)]
#[error("unknown root resource kind: {0}")]
pub struct UnknownResourceKind(pub String);

/// The closed set of root resource kinds.
///
/// A root resource's URN is globally keyed by its id alone (`urn:repo:42`);
/// every other resource kind is scoped by a qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    User,
    Org,
    Repo,
    Team,
}

impl ResourceKind {
    /// Returns the kind as the lowercase string used in URNs and request types.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Org => "org",
            ResourceKind::Repo => "repo",
            ResourceKind::Team => "team",
        }
    }

    /// Returns true if `kind` names a root resource kind.
    pub fn is_root_type(kind: &str) -> bool {
        ResourceKind::from_str(kind).is_ok()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ResourceKind::User),
            "org" => Ok(ResourceKind::Org),
            "repo" => Ok(ResourceKind::Repo),
            "team" => Ok(ResourceKind::Team),
            other => Err(UnknownResourceKind(other.to_string())),
        }
    }
}

/// A canonical, colon-delimited identity string for a resource in the crawl
/// graph.
///
/// URNs are deterministic: the same `(type, id, qualifier)` inputs always
/// produce the same URN. They are built by concatenation only; there is no
/// parsing of ids back out of a URN in the hot path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Builds the URN of a root resource: `urn:<kind>:<id>`.
    pub fn root(kind: ResourceKind, id: impl fmt::Display) -> Self {
        Urn(format!("urn:{}:{}", kind.as_str(), id))
    }

    /// Builds a URN for an arbitrary (not necessarily root) resource kind:
    /// `urn:<kind>:<id>`.
    ///
    /// Used by relation pages and event expansion, where the element kind is
    /// carried as a string.
    pub fn typed(kind: &str, id: impl fmt::Display) -> Self {
        Urn(format!("urn:{}:{}", kind, id))
    }

    /// Builds the URN of a global sibling set, such as `urn:orgs`.
    pub fn global(name: &str) -> Self {
        Urn(format!("urn:{}", name))
    }

    /// Appends one colon-delimited segment.
    pub fn join(&self, segment: impl fmt::Display) -> Self {
        Urn(format!("{}:{}", self.0, segment))
    }

    /// Returns the URN as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `self` is a segment-wise prefix of `other`.
    ///
    /// `urn:repo:4` is not a prefix of `urn:repo:42`.
    pub fn is_prefix_of(&self, other: &Urn) -> bool {
        other.0 == self.0
            || other
                .0
                .strip_prefix(&self.0)
                .is_some_and(|rest| rest.starts_with(':'))
    }

    /// Returns the root resource kind this URN starts with, if any.
    pub fn root_kind(&self) -> Option<ResourceKind> {
        let rest = self.0.strip_prefix("urn:")?;
        let first = rest.split(':').next()?;
        ResourceKind::from_str(first).ok()
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
