//! ghgraph - the document processor of a distributed GitHub crawler.
//!
//! Given a freshly fetched GitHub resource and the crawl request that
//! produced it, the processor stamps the document with stable, resource-typed
//! URNs, records typed links to every related resource, derives follow-up
//! fetch requests with correctly propagated traversal context, handles
//! paginated collections, and expands Events API records per event type.
//!
//! The HTTP fetcher, token pool, queue backends, store backends, and
//! orchestration live elsewhere; this crate reaches them through the
//! [`policy::Policy`], [`store::DocumentStore`], and [`queue::QueueSet`]
//! seams and ships in-memory implementations of the latter two.

#[cfg(test)]
pub mod test_utils;

pub mod events;
pub mod github;
pub mod policy;
pub mod processor;
pub mod queue;
pub mod store;
pub mod types;

pub use processor::{Outcome, ProcessError, Processor, PROCESSOR_VERSION};
pub use types::{Document, Request, RequestContext, Urn};
