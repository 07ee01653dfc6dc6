//! The document processor.
//!
//! `process(request)` is the single entry point: given a freshly fetched
//! GitHub resource and the crawl request that produced it, the processor
//! stamps the document with canonical URNs, records typed links to every
//! related resource, derives follow-up fetch requests with correctly
//! propagated context, and stamps the metadata envelope.
//!
//! # Dispatch
//!
//! A handler is resolved in three steps:
//!
//! 1. If the request URL carries a `page` query parameter, the page
//!    processor handles that page number.
//! 2. Otherwise, if the declared type is a collection type, the collection
//!    processor fans out the remaining pages and processes page one.
//! 3. Otherwise the per-type handler runs: a resource handler, one of the
//!    event operations, or a per-event-type handler resolved through the
//!    closed event registry.
//!
//! No handler, or a policy rejection, marks the request skipped and leaves
//! the document untouched. Skips are reported on the request, never raised
//! as errors; handler errors propagate unchanged.

mod helpers;
mod pagination;
mod relation;
mod resources;

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::events::EventType;
use crate::github::LinkHeaderError;
use crate::store::{DocumentStore, StoreError};
use crate::types::{Request, SkipKind};

pub use helpers::Overrides;

/// Version stamped into `_metadata.version` of every processed document.
///
/// Bump when link derivation changes so re-crawls know which documents are
/// stale.
pub const PROCESSOR_VERSION: u32 = 13;

/// Errors raised while processing a request.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A required document field was absent. The processor never fabricates
    /// URNs from missing ids.
    #[error("request {request_type}: required field `{field}` is missing")]
    MissingField {
        request_type: String,
        field: String,
    },

    /// The request reached the processor without a fetched document.
    #[error("request {request_type} has no document to process")]
    MissingDocument { request_type: String },

    /// The response's pagination header could not be parsed.
    #[error(transparent)]
    LinkHeader(#[from] LinkHeaderError),

    /// A URL needed for page fan-out could not be parsed.
    #[error("invalid url `{url}`: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The document store failed during event discovery.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What `process` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler ran; the document carries its links and the request its
    /// derived follow-ups.
    Processed {
        /// Links recorded on the document (0 when the handler discarded it).
        links: usize,
        /// Follow-up requests derived.
        queued: usize,
    },

    /// No handler matched, or the policy excluded the request.
    Skipped(SkipKind),
}

/// Source of relation traversal guids. Injectable so tests can pin guids
/// and assert full link sets deterministically.
pub type GuidSource = Arc<dyn Fn() -> Uuid + Send + Sync>;

/// The document processor.
///
/// Holds no mutable state: one `process` call is a self-contained
/// transformation of one request, and many may run in parallel against the
/// same processor.
pub struct Processor {
    version: u32,
    store: Arc<dyn DocumentStore>,
    scrub_patches: bool,
    guids: GuidSource,
}

impl Processor {
    /// Creates a processor over the given store with default settings.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Processor {
            version: PROCESSOR_VERSION,
            store,
            scrub_patches: true,
            guids: Arc::new(Uuid::new_v4),
        }
    }

    /// Overrides the version stamped into processed documents.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Toggles stripping of `patch` bodies from commit file entries.
    ///
    /// Scrubbing bounds storage size; turn it off if downstream consumers
    /// need diffs.
    pub fn with_scrub_patches(mut self, scrub: bool) -> Self {
        self.scrub_patches = scrub;
        self
    }

    /// Replaces the relation guid source.
    pub fn with_guid_source(mut self, guids: GuidSource) -> Self {
        self.guids = guids;
        self
    }

    /// The version this processor stamps.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn scrub_patches(&self) -> bool {
        self.scrub_patches
    }

    pub(crate) fn new_guid(&self) -> Uuid {
        (self.guids)()
    }

    /// Processes one request.
    ///
    /// On success the request's document (when one remains) carries the
    /// recorded links plus the version and `processed_at` stamps, and the
    /// request's outbound list holds every derived follow-up. The only
    /// await point is event discovery; everything else is CPU work.
    ///
    /// # Errors
    ///
    /// Handler errors (malformed documents, store failures, parse failures)
    /// propagate unchanged. Skips are reported in the outcome instead.
    pub async fn process(&self, request: &mut Request) -> Result<Outcome, ProcessError> {
        let Some(resolved) = self.resolve(request) else {
            warn!(kind = %request.kind(), url = %request.url(), "no handler for request type");
            request.mark_skip(
                SkipKind::NoHandler,
                format!("no handler for type `{}`", request.kind()),
            );
            return Ok(Outcome::Skipped(SkipKind::NoHandler));
        };

        if !request.policy().should_process(request, self.version) {
            debug!(kind = %request.kind(), version = self.version, "policy excluded request");
            request.mark_skip(SkipKind::Excluded, "excluded by policy");
            return Ok(Outcome::Skipped(SkipKind::Excluded));
        }

        debug!(kind = %request.kind(), url = %request.url(), ?resolved, "processing request");
        match resolved {
            Resolved::Page(page) => self.page(page, request)?,
            Resolved::Collection => self.collection(request)?,
            Resolved::Resource(handler) => self.resource(handler, request)?,
            Resolved::EventTrigger => self.event_trigger(request)?,
            Resolved::UpdateEvents => self.update_events(request).await?,
            Resolved::Event(event_type) => self.event(event_type, request)?,
        }

        let mut links = 0;
        if let Ok(document) = request.document_mut() {
            let metadata = document.metadata_mut();
            metadata.version = Some(self.version);
            metadata.processed_at = Some(Utc::now());
            links = metadata.links.len();
        }
        Ok(Outcome::Processed {
            links,
            queued: request.outbound().len(),
        })
    }

    /// Resolves the handler for a request, or `None` when nothing matches.
    fn resolve(&self, request: &Request) -> Option<Resolved> {
        if let Some(page) = page_parameter(request.url()) {
            return Some(Resolved::Page(page));
        }
        if request.is_collection_type() {
            return Some(Resolved::Collection);
        }
        match request.kind() {
            "org" => Some(Resolved::Resource(ResourceHandler::Org)),
            "user" => Some(Resolved::Resource(ResourceHandler::User)),
            "repo" => Some(Resolved::Resource(ResourceHandler::Repo)),
            "team" => Some(Resolved::Resource(ResourceHandler::Team)),
            "commit" => Some(Resolved::Resource(ResourceHandler::Commit)),
            // Event expansion queues pull requests under the `pull` type;
            // both names share the handler.
            "pull_request" | "pull" => Some(Resolved::Resource(ResourceHandler::PullRequest)),
            "issue" => Some(Resolved::Resource(ResourceHandler::Issue)),
            "issue_comment" | "review_comment" | "pull_comment" | "commit_comment" => {
                Some(Resolved::Resource(ResourceHandler::Comment))
            }
            "pull_review" => Some(Resolved::Resource(ResourceHandler::PullReview)),
            "status" => Some(Resolved::Resource(ResourceHandler::Status)),
            "deployment" => Some(Resolved::Resource(ResourceHandler::Deployment)),
            "milestone" => Some(Resolved::Resource(ResourceHandler::Milestone)),
            "page_build" => Some(Resolved::Resource(ResourceHandler::PageBuild)),
            "event_trigger" => Some(Resolved::EventTrigger),
            "update_events" => Some(Resolved::UpdateEvents),
            other => EventType::from_str(other).ok().map(Resolved::Event),
        }
    }

    fn resource(
        &self,
        handler: ResourceHandler,
        request: &mut Request,
    ) -> Result<(), ProcessError> {
        match handler {
            ResourceHandler::Org => self.org(request),
            ResourceHandler::User => self.user(request),
            ResourceHandler::Repo => self.repo(request),
            ResourceHandler::Team => self.team(request),
            ResourceHandler::Commit => self.commit(request),
            ResourceHandler::PullRequest => self.pull_request(request),
            ResourceHandler::Issue => self.issue(request),
            ResourceHandler::Comment => self.comment(request),
            ResourceHandler::PullReview => self.pull_review(request),
            ResourceHandler::Status => self.status(request),
            ResourceHandler::Deployment => self.deployment(request),
            ResourceHandler::Milestone => self.milestone(request),
            ResourceHandler::PageBuild => self.page_build(request),
        }
    }
}

/// The resolved handler for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    /// Process one page of an already fanned-out collection.
    Page(u32),
    /// Fan out a collection's pages, then process page one.
    Collection,
    /// A per-resource-type handler.
    Resource(ResourceHandler),
    /// Synthesize an event feed refresh.
    EventTrigger,
    /// Discover new events in a fetched feed page.
    UpdateEvents,
    /// A per-event-type handler.
    Event(EventType),
}

/// The closed set of resource handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceHandler {
    Org,
    User,
    Repo,
    Team,
    Commit,
    PullRequest,
    Issue,
    Comment,
    PullReview,
    Status,
    Deployment,
    Milestone,
    PageBuild,
}

/// Extracts a numeric `page` query parameter, if the URL carries one.
///
/// Unparseable URLs and non-numeric page values fall through to normal
/// handler resolution; only URLs the pagination engine itself built are
/// expected to match.
fn page_parameter(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}
