//! Core domain types: URNs, typed links, documents, and crawl requests.
//!
//! These types encode the crawl graph's invariants: deterministic identity
//! (URNs), one self link per document, and follow-up requests as data.

pub mod document;
pub mod links;
pub mod request;
pub mod urn;

// Re-export commonly used types at the module level
pub use document::{json_id, Document, Metadata};
pub use links::{Href, LinkValue};
pub use request::{
    Outbound, RelationDescriptor, Request, RequestContext, ResponseInfo, Skip, SkipKind,
    COLLECTION_TYPES,
};
pub use urn::{ResourceKind, UnknownResourceKind, Urn};
