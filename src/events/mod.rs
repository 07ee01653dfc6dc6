//! Event ingestion and expansion.
//!
//! The crawler is pull-based against GitHub's Events API. Two operations
//! drive ingestion:
//!
//! - `event_trigger` synthesizes a feed refresh for an org or repo and
//!   queues it at `immediate` priority (feeds go stale fastest).
//! - `update_events` receives a fetched feed page, discovers which events
//!   the store has not seen (etag lookups, bounded concurrency), and queues
//!   one request per new event with the raw event as its payload.
//!
//! Discovered event requests are typed by the GitHub event type string and
//! dispatched through [`EventType`], a closed registry: there is one
//! handler per known type, and unknown type strings are skipped rather
//! than guessed at.

mod handlers;

use std::fmt;
use std::str::FromStr;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::debug;

use crate::processor::{ProcessError, Processor};
use crate::queue::QueuePriority;
use crate::types::Request;

/// Upper bound on simultaneous store lookups during event discovery.
const DISCOVERY_CONCURRENCY: usize = 10;

/// The closed set of GitHub event types the processor expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    CommitCommentEvent,
    CreateEvent,
    DeleteEvent,
    DeploymentEvent,
    DeploymentStatusEvent,
    ForkEvent,
    GollumEvent,
    IssueCommentEvent,
    IssuesEvent,
    LabelEvent,
    MemberEvent,
    MembershipEvent,
    MilestoneEvent,
    PageBuildEvent,
    PublicEvent,
    PullRequestEvent,
    PullRequestReviewEvent,
    PullRequestReviewCommentEvent,
    PushEvent,
}

impl EventType {
    /// Every known event type, in registry order.
    pub const ALL: &'static [EventType] = &[
        EventType::CommitCommentEvent,
        EventType::CreateEvent,
        EventType::DeleteEvent,
        EventType::DeploymentEvent,
        EventType::DeploymentStatusEvent,
        EventType::ForkEvent,
        EventType::GollumEvent,
        EventType::IssueCommentEvent,
        EventType::IssuesEvent,
        EventType::LabelEvent,
        EventType::MemberEvent,
        EventType::MembershipEvent,
        EventType::MilestoneEvent,
        EventType::PageBuildEvent,
        EventType::PublicEvent,
        EventType::PullRequestEvent,
        EventType::PullRequestReviewEvent,
        EventType::PullRequestReviewCommentEvent,
        EventType::PushEvent,
    ];

    /// The GitHub wire name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CommitCommentEvent => "CommitCommentEvent",
            EventType::CreateEvent => "CreateEvent",
            EventType::DeleteEvent => "DeleteEvent",
            EventType::DeploymentEvent => "DeploymentEvent",
            EventType::DeploymentStatusEvent => "DeploymentStatusEvent",
            EventType::ForkEvent => "ForkEvent",
            EventType::GollumEvent => "GollumEvent",
            EventType::IssueCommentEvent => "IssueCommentEvent",
            EventType::IssuesEvent => "IssuesEvent",
            EventType::LabelEvent => "LabelEvent",
            EventType::MemberEvent => "MemberEvent",
            EventType::MembershipEvent => "MembershipEvent",
            EventType::MilestoneEvent => "MilestoneEvent",
            EventType::PageBuildEvent => "PageBuildEvent",
            EventType::PublicEvent => "PublicEvent",
            EventType::PullRequestEvent => "PullRequestEvent",
            EventType::PullRequestReviewEvent => "PullRequestReviewEvent",
            EventType::PullRequestReviewCommentEvent => "PullRequestReviewCommentEvent",
            EventType::PushEvent => "PushEvent",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for event type strings outside the registry.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|event_type| event_type.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

impl Processor {
    /// Synthesizes one feed refresh for the qualifier named by the request
    /// URL.
    ///
    /// An `event_trigger` request carries only a GitHub name qualifier in
    /// its URL slot: `owner/repo` selects the repo feed, a bare org login
    /// selects the org feed. The refresh is queued at `immediate` priority.
    pub(crate) fn event_trigger(&self, request: &mut Request) -> Result<(), ProcessError> {
        let qualifier = request.url().trim().to_string();
        if qualifier.is_empty() {
            return Err(request.missing("qualifier"));
        }
        let url = if qualifier.contains('/') {
            format!("https://api.github.com/repos/{qualifier}/events")
        } else {
            format!("https://api.github.com/orgs/{qualifier}/events")
        };
        debug!(%qualifier, %url, "triggering event feed refresh");
        let refresh = Request::new("update_events", url).with_policy(request.policy().clone());
        request.queue_requests(vec![refresh], QueuePriority::Immediate);
        Ok(())
    }

    /// Discovers new events in a fetched feed page and queues their
    /// expansion.
    ///
    /// An event is new when the store has no etag for its URL. Lookups run
    /// with bounded concurrency and the whole discovery is awaited before
    /// this returns, so the request cannot be finalized with discovery
    /// still pending. Each new event becomes a request typed by the
    /// event's type string, carrying the raw event as its payload.
    ///
    /// The feed page itself is discarded rather than stored; only the
    /// events it revealed matter.
    ///
    /// # Errors
    ///
    /// Store failures propagate and fail this request.
    pub(crate) async fn update_events(&self, request: &mut Request) -> Result<(), ProcessError> {
        let kind = request.kind().to_string();
        let events = request
            .document()?
            .elements()
            .ok_or_else(|| request.missing("elements"))?
            .clone();
        let total = events.len();

        let store = self.store().clone();
        let discovered: Vec<Option<(String, String, Value)>> = stream::iter(
            events.into_iter().map(|event| {
                let store = store.clone();
                let kind = kind.clone();
                async move {
                    let url = event
                        .get("url")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| ProcessError::MissingField {
                            request_type: kind.clone(),
                            field: "event.url".to_string(),
                        })?;
                    let event_type = event
                        .get("type")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| ProcessError::MissingField {
                            request_type: kind,
                            field: "event.type".to_string(),
                        })?;
                    let known = store.etag("event", &url).await?;
                    Ok::<_, ProcessError>(known.is_none().then_some((event_type, url, event)))
                }
            }),
        )
        .buffered(DISCOVERY_CONCURRENCY)
        .try_collect()
        .await?;

        let new_requests: Vec<Request> = discovered
            .into_iter()
            .flatten()
            .map(|(event_type, url, event)| {
                Request::new(event_type, url)
                    .with_payload(event)
                    .with_policy(request.policy().clone())
            })
            .collect();
        debug!(total, new = new_requests.len(), "event discovery complete");
        request.queue_requests(new_requests, QueuePriority::Normal);
        request.discard_document();
        Ok(())
    }

    /// Dispatches one discovered event to its per-type handler.
    pub(crate) fn event(
        &self,
        event_type: EventType,
        request: &mut Request,
    ) -> Result<(), ProcessError> {
        match event_type {
            EventType::CommitCommentEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "comment", "commit_comment")
            }
            // Branch, wiki, label, and visibility events carry nothing worth
            // a follow-up fetch beyond the basics.
            EventType::CreateEvent
            | EventType::DeleteEvent
            | EventType::GollumEvent
            | EventType::LabelEvent
            | EventType::PublicEvent
            | EventType::PushEvent => {
                self.event_basics(request)?;
                Ok(())
            }
            EventType::DeploymentEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "deployment", "deployment")
            }
            EventType::DeploymentStatusEvent => self.deployment_status_event(request),
            EventType::ForkEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "forkee", "repo")
            }
            EventType::IssueCommentEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "comment", "issue_comment")?;
                self.event_resource(request, scope.repo.as_deref(), "issue", "issue")
            }
            EventType::IssuesEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "issue", "issue")
            }
            EventType::MemberEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "member", "user")
            }
            EventType::MembershipEvent => self.membership_event(request),
            EventType::MilestoneEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "milestone", "milestone")
            }
            EventType::PageBuildEvent => self.page_build_event(request),
            EventType::PullRequestEvent => {
                let scope = self.event_basics(request)?;
                self.event_resource(request, scope.repo.as_deref(), "pull_request", "pull_request")
            }
            EventType::PullRequestReviewEvent => self.pull_request_review_event(request),
            EventType::PullRequestReviewCommentEvent => {
                self.pull_request_review_comment_event(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, InMemoryStore, StoreError};
    use crate::test_utils::fixed_guid_processor;
    use crate::types::Document;
    use async_trait::async_trait;
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Arc;

    // ─── Registry ───

    #[test]
    fn every_event_type_roundtrips_through_its_name() {
        for event_type in EventType::ALL {
            assert_eq!(
                EventType::from_str(event_type.as_str()).unwrap(),
                *event_type
            );
        }
    }

    #[test]
    fn unknown_event_types_are_rejected() {
        assert!(EventType::from_str("SponsorshipEvent").is_err());
        assert!(EventType::from_str("pushevent").is_err());
        assert!(EventType::from_str("").is_err());
    }

    #[test]
    fn registry_covers_nineteen_types() {
        assert_eq!(EventType::ALL.len(), 19);
    }

    // ─── event_trigger ───

    #[test]
    fn trigger_with_slash_selects_repo_feed() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("event_trigger", "acme/widget");
        processor.event_trigger(&mut request).unwrap();

        let out = request.outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].request.kind(), "update_events");
        assert_eq!(
            out[0].request.url(),
            "https://api.github.com/repos/acme/widget/events"
        );
        assert_eq!(out[0].priority, QueuePriority::Immediate);
    }

    #[test]
    fn trigger_without_slash_selects_org_feed() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("event_trigger", "acme");
        processor.event_trigger(&mut request).unwrap();
        assert_eq!(
            request.outbound()[0].request.url(),
            "https://api.github.com/orgs/acme/events"
        );
    }

    #[test]
    fn trigger_without_qualifier_fails_loudly() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("event_trigger", "");
        assert!(matches!(
            processor.event_trigger(&mut request),
            Err(ProcessError::MissingField { .. })
        ));
    }

    // ─── update_events ───

    fn feed_event(event_type: &str, url: &str) -> Value {
        json!({
            "id": "22000000001",
            "type": event_type,
            "url": url,
            "actor": {"id": 1, "url": "https://api.github.com/users/a"},
            "payload": {},
        })
    }

    fn feed_request(events: Vec<Value>) -> Request {
        let url = "https://api.github.com/repos/acme/widget/events";
        Request::new("update_events", url).with_document(Document::new(
            "update_events",
            url,
            Value::Array(events),
        ))
    }

    #[tokio::test]
    async fn only_unknown_events_are_queued() {
        let store = Arc::new(InMemoryStore::new());
        store.insert_etag("event", "https://x.test/events/b", "\"e1\"").await;
        let processor = crate::processor::Processor::new(store);

        let mut request = feed_request(vec![
            feed_event("PushEvent", "https://x.test/events/a"),
            feed_event("ForkEvent", "https://x.test/events/b"),
            feed_event("IssuesEvent", "https://x.test/events/c"),
        ]);
        processor.update_events(&mut request).await.unwrap();

        let out = request.outbound();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].request.kind(), "PushEvent");
        assert_eq!(out[0].request.url(), "https://x.test/events/a");
        assert_eq!(out[1].request.kind(), "IssuesEvent");
        assert_eq!(out[1].request.url(), "https://x.test/events/c");
        // Each new request carries the raw event as payload.
        assert_eq!(
            out[0].request.payload().unwrap()["type"],
            json!("PushEvent")
        );
    }

    #[tokio::test]
    async fn feed_page_is_discarded() {
        let processor = fixed_guid_processor();
        let mut request = feed_request(vec![feed_event("PushEvent", "https://x.test/events/a")]);
        processor.update_events(&mut request).await.unwrap();
        assert!(request.document_opt().is_none());
    }

    #[tokio::test]
    async fn empty_feed_queues_nothing() {
        let processor = fixed_guid_processor();
        let mut request = feed_request(vec![]);
        processor.update_events(&mut request).await.unwrap();
        assert!(request.outbound().is_empty());
    }

    #[tokio::test]
    async fn store_failures_fail_the_request() {
        #[derive(Debug)]
        struct FailingStore;

        #[async_trait]
        impl DocumentStore for FailingStore {
            async fn etag(&self, _: &str, _: &str) -> Result<Option<String>, StoreError> {
                Err(StoreError::Backend("etag index unavailable".to_string()))
            }
        }

        let processor = crate::processor::Processor::new(Arc::new(FailingStore));
        let mut request = feed_request(vec![feed_event("PushEvent", "https://x.test/events/a")]);
        let err = processor.update_events(&mut request).await.unwrap_err();
        assert!(matches!(err, ProcessError::Store(_)));
    }

    #[tokio::test]
    async fn event_without_url_fails_loudly() {
        let processor = fixed_guid_processor();
        let mut request = feed_request(vec![json!({"id": "1", "type": "PushEvent"})]);
        let err = processor.update_events(&mut request).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::MissingField { ref field, .. } if field == "event.url"
        ));
    }

    #[tokio::test]
    async fn discovery_preserves_feed_order() {
        let processor = fixed_guid_processor();
        let events: Vec<Value> = (0..25)
            .map(|i| feed_event("PushEvent", &format!("https://x.test/events/{i}")))
            .collect();
        let mut request = feed_request(events);
        processor.update_events(&mut request).await.unwrap();

        let urls: Vec<_> = request
            .outbound()
            .iter()
            .map(|o| o.request.url().to_string())
            .collect();
        let expected: Vec<_> = (0..25)
            .map(|i| format!("https://x.test/events/{i}"))
            .collect();
        assert_eq!(urls, expected);
    }
}
