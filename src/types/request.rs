//! Crawl work items.
//!
//! A [`Request`] describes one fetch-and-process unit: the resource kind,
//! the source URL, the traversal context inherited from the parent, and the
//! fetched document once the fetcher has run. Handlers record typed links on
//! the document and derive follow-up requests.
//!
//! # Effects as data
//!
//! Follow-up requests are not pushed at a queue backend directly. Every
//! `queue_*` call appends an [`Outbound`] entry (request plus priority) to
//! the request; the orchestrator drains those entries into its queue set
//! after `process` returns. This keeps processing a pure transformation that
//! can be tested without any queue infrastructure, and it preserves the
//! ordering guarantee that pagination requests appear before the element
//! fetches of the page that produced them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::policy::{DefaultPolicy, Policy};
use crate::processor::ProcessError;
use crate::queue::QueuePriority;

use super::document::{json_id, Document};
use super::links::{Href, LinkValue};
use super::urn::{ResourceKind, Urn};

/// Request types the pagination engine treats as collections.
///
/// A request whose declared type is in this set (and whose URL carries no
/// `page` parameter yet) is handled by the collection processor, which fans
/// out the remaining pages and then processes page one.
pub const COLLECTION_TYPES: &[&str] = &[
    "orgs",
    "users",
    "repos",
    "teams",
    "issues",
    "commits",
    "pull_requests",
    "members",
    "collaborators",
    "contributors",
    "subscribers",
    "issue_comments",
    "review_comments",
    "statuses",
];

/// Traversal state inherited from the parent request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// URN prefix this request's document is scoped under. Root resources
    /// qualify themselves and may omit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Urn>,

    /// Set on every page request of a relation traversal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<RelationDescriptor>,

    /// Resource kind of the elements of a collection page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,

    /// Advisory visibility marker propagated down from a private repo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_type: Option<String>,
}

impl RequestContext {
    /// Context scoped under a qualifier, with no other inherited state.
    pub fn qualified(qualifier: Urn) -> Self {
        RequestContext {
            qualifier: Some(qualifier),
            ..Default::default()
        }
    }
}

/// Identity of one multi-page relation traversal.
///
/// The `guid` is freshly generated per traversal and brands every page, so
/// consumers can reconstruct a coherent snapshot by unioning pages that
/// share it. Distinct snapshots of the same relation never alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Resource type of the document that declared the relation.
    pub origin: String,

    /// Relation name (`members`, `collaborators`, ...).
    pub name: String,

    /// Resource kind of the related elements.
    pub kind: String,

    /// Traversal identity shared by all pages of one snapshot.
    pub guid: Uuid,
}

/// HTTP response metadata the processor reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    /// Raw `Link:` header, if the response carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_header: Option<String>,

    /// Entity tag of the fetched body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Why a request was skipped rather than processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// No handler recognizes the request type.
    NoHandler,
    /// The processing policy excluded this request/version pair.
    Excluded,
}

/// A skip marking recorded on the request. Skips are not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skip {
    pub kind: SkipKind,
    pub reason: String,
}

/// A follow-up request derived during processing, with the queue priority it
/// should be pushed at.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub request: Request,
    pub priority: QueuePriority,
}

/// One fetch-and-process work item.
#[derive(Debug, Clone)]
pub struct Request {
    kind: String,
    url: String,

    /// Inherited traversal state. Handlers may set advisory fields.
    pub context: RequestContext,

    policy: Arc<dyn Policy>,
    document: Option<Document>,
    response: Option<ResponseInfo>,
    payload: Option<Value>,
    skip: Option<Skip>,
    outbound: Vec<Outbound>,
}

impl Request {
    /// Creates a request with an empty context and the default policy.
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Request {
            kind: kind.into(),
            url: url.into(),
            context: RequestContext::default(),
            policy: Arc::new(DefaultPolicy),
            document: None,
            response: None,
            payload: None,
            skip: None,
            outbound: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_response(mut self, response: ResponseInfo) -> Self {
        self.response = Some(response);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// The declared resource kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The source URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The processing policy carried by this request.
    pub fn policy(&self) -> &Arc<dyn Policy> {
        &self.policy
    }

    /// HTTP metadata of the fetch, if recorded.
    pub fn response(&self) -> Option<&ResponseInfo> {
        self.response.as_ref()
    }

    /// The event payload slot used by event expansion.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Moves the payload into the document slot.
    ///
    /// The fetcher calls this for payload-carrying requests (discovered
    /// events) instead of performing an HTTP fetch.
    pub fn promote_payload(&mut self) {
        if let Some(payload) = self.payload.take() {
            self.document = Some(Document::new(self.kind.clone(), self.url.clone(), payload));
        }
    }

    /// The fetched document, or a structured failure if the fetcher has not
    /// populated it.
    pub fn document(&self) -> Result<&Document, ProcessError> {
        self.document
            .as_ref()
            .ok_or_else(|| ProcessError::MissingDocument {
                request_type: self.kind.clone(),
            })
    }

    /// Mutable access to the fetched document.
    pub fn document_mut(&mut self) -> Result<&mut Document, ProcessError> {
        let kind = self.kind.clone();
        self.document
            .as_mut()
            .ok_or(ProcessError::MissingDocument { request_type: kind })
    }

    /// The fetched document, if present.
    pub fn document_opt(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Discards the document so the orchestrator does not store it.
    pub fn discard_document(&mut self) {
        self.document = None;
    }

    /// The skip marking, if this request was skipped.
    pub fn skip(&self) -> Option<&Skip> {
        self.skip.as_ref()
    }

    /// Marks this request skipped. Skips are reported on the request, not
    /// raised as errors.
    pub fn mark_skip(&mut self, kind: SkipKind, reason: impl Into<String>) {
        self.skip = Some(Skip {
            kind,
            reason: reason.into(),
        });
    }

    /// Follow-up requests derived so far, in derivation order.
    pub fn outbound(&self) -> &[Outbound] {
        &self.outbound
    }

    /// Removes and returns the derived follow-up requests.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    /// Returns true if `kind` names a root resource kind.
    pub fn is_root_type(kind: &str) -> bool {
        ResourceKind::is_root_type(kind)
    }

    /// Returns true if this request's declared type is a collection type.
    pub fn is_collection_type(&self) -> bool {
        COLLECTION_TYPES.contains(&self.kind.as_str())
    }

    /// The URN prefix this request's children are scoped under.
    ///
    /// Root resources qualify themselves: once their self link is recorded,
    /// it is the qualifier. All other requests inherit the qualifier from
    /// their context.
    pub fn qualifier(&self) -> Result<Urn, ProcessError> {
        if ResourceKind::is_root_type(&self.kind) {
            if let Some(href) = self.document.as_ref().and_then(Document::self_href) {
                return Ok(href.clone());
            }
        }
        self.context
            .qualifier
            .clone()
            .ok_or_else(|| self.missing("context.qualifier"))
    }

    /// A structured failure naming a missing required field.
    pub fn missing(&self, field: impl Into<String>) -> ProcessError {
        ProcessError::MissingField {
            request_type: self.kind.clone(),
            field: field.into(),
        }
    }

    // ─── Link recording ───

    fn insert_link(&mut self, name: &str, link: LinkValue) -> Result<(), ProcessError> {
        trace!(link = name, request_type = %self.kind, "recording link");
        self.document_mut()?
            .metadata_mut()
            .links
            .insert(name.to_string(), link);
        Ok(())
    }

    /// Records the canonical self link. Later writes replace earlier ones,
    /// so a document always has exactly one identity.
    pub fn link_self(&mut self, urn: Urn) -> Result<(), ProcessError> {
        self.insert_link("self", LinkValue::SelfLink { href: urn })
    }

    /// Records `self = urn:<type>:<document.id>` for a root resource.
    pub fn add_root_self_link(&mut self) -> Result<Urn, ProcessError> {
        let id = self
            .document()?
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| self.missing("id"))?;
        let urn = Urn::typed(&self.kind, id);
        self.link_self(urn.clone())?;
        Ok(urn)
    }

    /// Records `self = <qualifier>:<type>:<document.id>`.
    pub fn add_self_link(&mut self) -> Result<Urn, ProcessError> {
        self.add_self_link_keyed("id")
    }

    /// Records `self = <qualifier>:<type>:<document[key]>`.
    ///
    /// Commits key their identity off `sha` rather than `id`.
    pub fn add_self_link_keyed(&mut self, key: &str) -> Result<Urn, ProcessError> {
        let id = self
            .document()?
            .get(key)
            .and_then(json_id)
            .ok_or_else(|| self.missing(key))?;
        let urn = self.qualifier()?.join(&self.kind).join(id);
        self.link_self(urn.clone())?;
        Ok(urn)
    }

    /// Records the collection URN this document belongs to.
    pub fn link_siblings(&mut self, urn: Urn) -> Result<(), ProcessError> {
        self.insert_link("siblings", LinkValue::Siblings { href: urn })
    }

    /// Records a singular reference to another document.
    pub fn link_resource(&mut self, name: &str, urn: Urn) -> Result<(), ProcessError> {
        self.insert_link(
            name,
            LinkValue::Resource {
                href: Href::One(urn),
            },
        )
    }

    /// Records a reference to several documents under one name.
    pub fn link_resources(&mut self, name: &str, urns: Vec<Urn>) -> Result<(), ProcessError> {
        self.insert_link(
            name,
            LinkValue::Resource {
                href: Href::Many(urns),
            },
        )
    }

    /// Records an owned multi-document set.
    pub fn link_collection(&mut self, name: &str, urn: Urn) -> Result<(), ProcessError> {
        self.insert_link(name, LinkValue::Collection { href: urn })
    }

    /// Records a non-owned association to a set.
    pub fn link_relation(&mut self, name: &str, urn: Urn) -> Result<(), ProcessError> {
        self.insert_link(name, LinkValue::Relation { href: urn })
    }

    // ─── Queueing ───

    fn child_context(&self, qualifier: Option<Urn>) -> RequestContext {
        RequestContext {
            qualifier,
            relation: None,
            element_type: None,
            repo_type: self.context.repo_type.clone(),
        }
    }

    fn push_outbound(&mut self, request: Request, priority: QueuePriority) {
        debug!(
            kind = %request.kind,
            url = %request.url,
            ?priority,
            from = %self.kind,
            "queueing follow-up request"
        );
        self.outbound.push(Outbound { request, priority });
    }

    /// Derives a follow-up fetch inheriting the current qualifier.
    pub fn queue(&mut self, kind: &str, url: impl Into<String>) {
        let context = self.child_context(self.context.qualifier.clone());
        let request = Request::new(kind, url)
            .with_context(context)
            .with_policy(self.policy.clone());
        self.push_outbound(request, QueuePriority::Normal);
    }

    /// Derives a fetch of a root resource. Roots qualify themselves, so no
    /// qualifier is inherited.
    pub fn queue_root(&mut self, kind: &str, url: impl Into<String>) {
        let context = self.child_context(None);
        let request = Request::new(kind, url)
            .with_context(context)
            .with_policy(self.policy.clone());
        self.push_outbound(request, QueuePriority::Normal);
    }

    /// Derives a collection fetch whose elements are root resources.
    ///
    /// The caller supplies the context (qualifier, element type, relation)
    /// the pages should run under; the advisory repo visibility marker is
    /// inherited when the caller did not set one.
    pub fn queue_roots(&mut self, name: &str, url: impl Into<String>, mut context: RequestContext) {
        if context.repo_type.is_none() {
            context.repo_type = self.context.repo_type.clone();
        }
        let request = Request::new(name, url)
            .with_context(context)
            .with_policy(self.policy.clone());
        self.push_outbound(request, QueuePriority::Normal);
    }

    /// Derives a fetch of a child resource scoped under `qualifier`.
    pub fn queue_child(&mut self, kind: &str, url: impl Into<String>, qualifier: Urn) {
        let context = self.child_context(Some(qualifier));
        let request = Request::new(kind, url)
            .with_context(context)
            .with_policy(self.policy.clone());
        self.push_outbound(request, QueuePriority::Normal);
    }

    /// Derives a collection fetch whose elements are child resources.
    pub fn queue_children(&mut self, name: &str, url: impl Into<String>, context: RequestContext) {
        self.queue_roots(name, url, context);
    }

    /// Derives a fetch for one element of a collection page, routing root
    /// kinds through [`queue_root`](Self::queue_root) and everything else
    /// through [`queue_child`](Self::queue_child).
    pub fn queue_collection_element(&mut self, kind: &str, url: impl Into<String>, qualifier: Urn) {
        if ResourceKind::is_root_type(kind) {
            self.queue_root(kind, url);
        } else {
            self.queue_child(kind, url, qualifier);
        }
    }

    /// Pushes fully-formed requests at an explicit priority.
    ///
    /// The pagination engine uses this to fan remaining pages out on the
    /// `soon` priority, and event triggering uses it for `immediate`.
    pub fn queue_requests(&mut self, requests: Vec<Request>, priority: QueuePriority) {
        for request in requests {
            self.push_outbound(request, priority);
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.url)
    }
}
