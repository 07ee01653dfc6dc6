//! Per-event-type expansion.
//!
//! Every discovered event is itself a document (the raw Events API record,
//! promoted from the request payload) and most of its value is in the
//! payload: the resources the event mentions get linked and queued for a
//! fresh fetch, which is how the crawler keeps up with a repository without
//! re-walking it.
//!
//! All handlers start from [`Processor::event_basics`], which settles the
//! event's own identity: scoped under the repo when the event names one,
//! under the org otherwise.

use serde_json::Value;

use crate::processor::{Overrides, ProcessError, Processor};
use crate::types::{json_id, Request, ResourceKind, Urn};

/// What `event_basics` learned about the event being expanded.
#[derive(Debug)]
pub(crate) struct EventScope {
    /// The event's own id (a decimal string on the wire).
    pub event_id: String,

    /// The repo id the event is scoped under, when it names one.
    pub repo: Option<String>,
}

impl Processor {
    /// Records the identity and common roots shared by every event type.
    ///
    /// The scope URN is `urn:repo:<id>` when the event names a repo,
    /// `urn:org:<id>` otherwise; self and siblings hang off it, keyed by
    /// the event type string. Actor, repo, and org roots are linked when
    /// present.
    pub(crate) fn event_basics(&self, request: &mut Request) -> Result<EventScope, ProcessError> {
        let event_id = request
            .document()?
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| request.missing("id"))?;
        let repo = request
            .document()?
            .get("repo")
            .and_then(|repo| repo.get("id"))
            .and_then(json_id);

        let scope_urn = match &repo {
            Some(id) => Urn::root(ResourceKind::Repo, id),
            None => {
                let org_id = request
                    .document()?
                    .get("org")
                    .and_then(|org| org.get("id"))
                    .and_then(json_id)
                    .ok_or_else(|| request.missing("org.id"))?;
                Urn::root(ResourceKind::Org, org_id)
            }
        };

        let kind = request.kind().to_string();
        request.link_self(scope_urn.join(&kind).join(&event_id))?;
        request.link_siblings(scope_urn.join(&kind))?;

        self.add_root(request, "actor", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "repo", ResourceKind::Repo, Overrides::none())?;
        self.add_root(request, "org", ResourceKind::Org, Overrides::none())?;

        Ok(EventScope { event_id, repo })
    }

    /// Links one payload resource and queues its fetch.
    ///
    /// The URN is repo-scoped (`urn:repo:<repo>:<name>:<id>`) when the
    /// event carries a repo, globally typed (`urn:<kind>:<id>`) otherwise.
    /// The fetch is queued as `(kind, payload[name].url)`, routed as a root
    /// or child fetch by the kind.
    pub(crate) fn event_resource(
        &self,
        request: &mut Request,
        repo: Option<&str>,
        name: &str,
        kind: &str,
    ) -> Result<(), ProcessError> {
        let (id, url) = self.payload_resource(request, name)?;
        match repo {
            Some(repo) => {
                let scope = Urn::root(ResourceKind::Repo, repo);
                request.link_resource(name, scope.join(name).join(id))?;
                request.queue_collection_element(kind, url, scope);
            }
            None => {
                request.link_resource(name, Urn::typed(kind, id))?;
                if ResourceKind::is_root_type(kind) {
                    request.queue_root(kind, url);
                } else {
                    request.queue(kind, url);
                }
            }
        }
        Ok(())
    }

    /// A deployment status. Adds the deeply nested status URN on top of
    /// the deployment expansion.
    pub(crate) fn deployment_status_event(
        &self,
        request: &mut Request,
    ) -> Result<(), ProcessError> {
        let scope = self.event_basics(request)?;
        let repo = scope.repo.as_deref().ok_or_else(|| request.missing("repo.id"))?.to_string();

        let deployment_id = self.payload_id(request, "deployment")?;
        let status_id = self.payload_id(request, "deployment_status")?;
        request.link_resource(
            "deployment_status",
            Urn::root(ResourceKind::Repo, &repo)
                .join("deployment")
                .join(deployment_id)
                .join("status")
                .join(status_id),
        )?;
        self.event_resource(request, Some(&repo), "deployment", "deployment")
    }

    /// A team membership change. The event re-homes under the team rather
    /// than a repo, and its member, team, and organization are all globally
    /// keyed roots.
    pub(crate) fn membership_event(&self, request: &mut Request) -> Result<(), ProcessError> {
        let scope = self.event_basics(request)?;

        let team_id = self.payload_id(request, "team")?;
        let kind = request.kind().to_string();
        request.link_self(
            Urn::root(ResourceKind::Team, team_id)
                .join(kind)
                .join(&scope.event_id),
        )?;

        self.event_resource(request, None, "member", "user")?;
        self.event_resource(request, None, "team", "team")?;
        self.event_resource(request, None, "organization", "org")?;
        Ok(())
    }

    /// A GitHub Pages build. The payload is flatter than the standard
    /// shape: the build id sits at the payload top level and the fetchable
    /// URL under `build`.
    pub(crate) fn page_build_event(&self, request: &mut Request) -> Result<(), ProcessError> {
        let scope = self.event_basics(request)?;
        let repo = scope.repo.as_deref().ok_or_else(|| request.missing("repo.id"))?.to_string();

        let payload = self.payload(request)?;
        let build_id = payload
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| request.missing("payload.id"))?;
        let build_url = payload
            .get("build")
            .and_then(|build| build.get("url"))
            .and_then(Value::as_str)
            .ok_or_else(|| request.missing("payload.build.url"))?
            .to_string();

        let scope_urn = Urn::root(ResourceKind::Repo, &repo);
        request.link_resource("page_build", scope_urn.join("page_build").join(build_id))?;
        request.queue_child("page_build", build_url, scope_urn);
        Ok(())
    }

    /// A submitted pull request review. Links the review under its pull,
    /// queues the pull itself, and queues the review's comments by
    /// substituting the review id into the `{/number}` template.
    pub(crate) fn pull_request_review_event(
        &self,
        request: &mut Request,
    ) -> Result<(), ProcessError> {
        let scope = self.event_basics(request)?;
        let repo = scope.repo.as_deref().ok_or_else(|| request.missing("repo.id"))?.to_string();

        let payload = self.payload(request)?;
        let pull = payload
            .get("pull_request")
            .cloned()
            .ok_or_else(|| request.missing("payload.pull_request"))?;
        let pull_id = pull
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| request.missing("payload.pull_request.id"))?;
        let pull_url = pull
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| request.missing("payload.pull_request.url"))?
            .to_string();
        let comments_template = pull
            .get("review_comment_url")
            .and_then(Value::as_str)
            .ok_or_else(|| request.missing("payload.pull_request.review_comment_url"))?
            .to_string();
        let review_id = self.payload_id(request, "review")?;

        let repo_urn = Urn::root(ResourceKind::Repo, &repo);
        let pull_urn = repo_urn.join("pull").join(&pull_id);
        request.link_resource("pull", pull_urn.clone())?;
        request.link_resource("review", pull_urn.join("review").join(&review_id))?;

        let comments_url =
            crate::github::substitute_template(&comments_template, "{/number}", &review_id);
        request.queue_child("pull_review", comments_url, pull_urn);
        request.queue_child("pull", pull_url, repo_urn);
        Ok(())
    }

    /// A review comment. Links the comment under its pull and queues both
    /// for a fresh fetch.
    pub(crate) fn pull_request_review_comment_event(
        &self,
        request: &mut Request,
    ) -> Result<(), ProcessError> {
        let scope = self.event_basics(request)?;
        let repo = scope.repo.as_deref().ok_or_else(|| request.missing("repo.id"))?.to_string();

        let (pull_id, pull_url) = self.payload_resource(request, "pull_request")?;
        let (comment_id, comment_url) = self.payload_resource(request, "comment")?;

        let repo_urn = Urn::root(ResourceKind::Repo, &repo);
        let pull_urn = repo_urn.join("pull").join(pull_id);
        request.link_resource("comment", pull_urn.join("comment").join(comment_id))?;
        request.link_resource("pull", pull_urn.clone())?;

        request.queue_child("pull_comment", comment_url, pull_urn);
        request.queue_child("pull", pull_url, repo_urn);
        Ok(())
    }

    /// The event payload object.
    fn payload(&self, request: &Request) -> Result<Value, ProcessError> {
        request
            .document()?
            .get("payload")
            .filter(|payload| payload.is_object())
            .cloned()
            .ok_or_else(|| request.missing("payload"))
    }

    /// Reads `payload[name]`'s id and url.
    fn payload_resource(
        &self,
        request: &Request,
        name: &str,
    ) -> Result<(String, String), ProcessError> {
        let payload = self.payload(request)?;
        let object = payload
            .get(name)
            .filter(|object| object.is_object())
            .ok_or_else(|| request.missing(format!("payload.{name}")))?;
        let id = object
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| request.missing(format!("payload.{name}.id")))?;
        let url = object
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| request.missing(format!("payload.{name}.url")))?
            .to_string();
        Ok((id, url))
    }

    /// Reads `payload[name].id`.
    fn payload_id(&self, request: &Request, name: &str) -> Result<String, ProcessError> {
        let payload = self.payload(request)?;
        payload
            .get(name)
            .and_then(|object| object.get("id"))
            .and_then(json_id)
            .ok_or_else(|| request.missing(format!("payload.{name}.id")))
    }
}
