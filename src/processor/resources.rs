//! Per-resource-type handlers.
//!
//! Each handler records the document's identity (`self`), the collection it
//! belongs to (`siblings`), and its outgoing references, using the helpers
//! in [`super::helpers`]. GitHub's resource model is irregular; the
//! handlers are where that irregularity is normalized:
//!
//! - orgs link their mirror user account by URL rewriting,
//! - commits key identity off `sha` instead of `id`,
//! - issues and pull requests cross-link each other under the issue's id,
//! - several fields carry URL templates that are stripped before queueing.

use serde_json::Value;

use crate::github::strip_template;
use crate::types::{json_id, Request, ResourceKind, Urn};

use super::{Overrides, ProcessError, Processor};

impl Processor {
    /// An organization. Links the mirror user account, owned repos, and
    /// the members relation.
    pub(crate) fn org(&self, request: &mut Request) -> Result<(), ProcessError> {
        request.add_root_self_link()?;
        request.link_siblings(Urn::global("orgs"))?;

        let id = required_id(request, "id")?;
        let url = self.url_field(request, "url")?;
        let members_url = strip_template(&self.url_field(request, "members_url")?, "{/member}");

        // Orgs are also user accounts; GitHub serves the user form of the
        // same entity at /users/<login> with the same id.
        self.add_root(
            request,
            "user",
            ResourceKind::User,
            Overrides::none()
                .url(url.replacen("/orgs/", "/users/", 1))
                .urn(Urn::root(ResourceKind::User, &id)),
        )?;
        self.add_collection(
            request,
            "repos",
            "repo",
            Overrides::none().urn(Urn::root(ResourceKind::User, &id).join("repos")),
        )?;
        self.add_relation(request, "members", "user", Overrides::none().url(members_url))?;
        Ok(())
    }

    /// A user account. Links the owned repos.
    pub(crate) fn user(&self, request: &mut Request) -> Result<(), ProcessError> {
        request.add_root_self_link()?;
        request.link_siblings(Urn::global("users"))?;
        self.add_collection(request, "repos", "repo", Overrides::none())?;
        Ok(())
    }

    /// A repository. The densest handler: owner and organization roots,
    /// four relations, and the issue/commit collections.
    pub(crate) fn repo(&self, request: &mut Request) -> Result<(), ProcessError> {
        let private = request
            .document()?
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if private {
            request.context.repo_type = Some("private".to_string());
        }

        let self_urn = request.add_root_self_link()?;
        let owner_id = request
            .document()?
            .get("owner")
            .and_then(|owner| owner.get("id"))
            .and_then(json_id)
            .ok_or_else(|| request.missing("owner.id"))?;
        request.link_siblings(Urn::root(ResourceKind::User, owner_id).join("repos"))?;

        // Pull requests have no list URL on the repo document; the link is
        // recorded so consumers can find PRs fetched through other paths.
        request.link_collection("pull_requests", self_urn.join("pull_requests"))?;

        self.add_root(request, "owner", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "organization", ResourceKind::Org, Overrides::none())?;

        self.add_relation(request, "teams", "team", Overrides::none())?;
        let collaborators_url = strip_template(
            &self.url_field(request, "collaborators_url")?,
            "{/collaborator}",
        );
        self.add_relation(
            request,
            "collaborators",
            "user",
            Overrides::none().url(collaborators_url),
        )?;
        self.add_relation(request, "contributors", "user", Overrides::none())?;
        self.add_relation(request, "subscribers", "user", Overrides::none())?;

        let issues_url = strip_template(&self.url_field(request, "issues_url")?, "{/number}");
        self.add_collection(request, "issues", "issue", Overrides::none().url(issues_url))?;
        let commits_url = strip_template(&self.url_field(request, "commits_url")?, "{/sha}");
        self.add_collection(request, "commits", "commit", Overrides::none().url(commits_url))?;
        Ok(())
    }

    /// A commit. Identity keys off the sha; the repo root is recovered from
    /// the commit's own URL. Patch bodies are stripped from the file list
    /// to bound storage.
    pub(crate) fn commit(&self, request: &mut Request) -> Result<(), ProcessError> {
        request.add_self_link_keyed("sha")?;
        let qualifier = request.qualifier()?;
        request.link_siblings(qualifier.join("commits"))?;

        let url = self.url_field(request, "url")?;
        let repo_url = match url.find("/commits/") {
            Some(index) => url[..index].to_string(),
            None => url,
        };
        self.add_root(
            request,
            "repo",
            ResourceKind::Repo,
            Overrides::none().url(repo_url).urn(qualifier),
        )?;
        self.add_root(request, "author", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "committer", ResourceKind::User, Overrides::none())?;

        if self.scrub_patches() {
            if let Some(files) = request
                .document_mut()?
                .body_mut()
                .get_mut("files")
                .and_then(Value::as_array_mut)
            {
                for file in files {
                    if let Some(entry) = file.as_object_mut() {
                        entry.remove("patch");
                    }
                }
            }
        }
        Ok(())
    }

    /// A pull request. Head and base repos are linked as roots, and the
    /// `_links` block drives the conditional collections. The twin issue is
    /// linked under the PR's id: GitHub serves every PR as an issue too,
    /// and the shared id keeps both views adjacent in the graph.
    pub(crate) fn pull_request(&self, request: &mut Request) -> Result<(), ProcessError> {
        request.add_self_link()?;
        let qualifier = request.qualifier()?;
        request.link_siblings(qualifier.join("pull_requests"))?;

        self.add_root(request, "user", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "merged_by", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "assignee", ResourceKind::User, Overrides::none())?;

        for name in ["head", "base"] {
            let repo = request
                .document()?
                .get(name)
                .and_then(|side| side.get("repo"))
                .filter(|repo| repo.is_object())
                .cloned();
            if let Some(repo) = repo {
                let id = repo
                    .get("id")
                    .and_then(json_id)
                    .ok_or_else(|| request.missing(format!("{name}.repo.id")))?;
                let url = repo
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| request.missing(format!("{name}.repo.url")))?
                    .to_string();
                self.add_root(
                    request,
                    name,
                    ResourceKind::Repo,
                    Overrides::none()
                        .url(url)
                        .urn(Urn::root(ResourceKind::Repo, id)),
                )?;
            }
        }

        let links = request.document()?.get("_links").cloned().unwrap_or(Value::Null);
        if let Some(href) = link_href(&links, "review_comments") {
            self.add_collection(
                request,
                "review_comments",
                "review_comment",
                Overrides::none().url(href),
            )?;
        }
        if let Some(href) = link_href(&links, "statuses") {
            let sha = request
                .document()?
                .get("head")
                .and_then(|head| head.get("sha"))
                .and_then(json_id)
                .ok_or_else(|| request.missing("head.sha"))?;
            self.add_collection(
                request,
                "statuses",
                "status",
                Overrides::none()
                    .url(href)
                    .urn(qualifier.join("commit").join(sha).join("statuses")),
            )?;
        }
        if let Some(href) = link_href(&links, "commits") {
            self.add_collection(request, "commits", "commit", Overrides::none().url(href))?;
        }
        if let Some(href) = link_href(&links, "issue") {
            let id = required_id(request, "id")?;
            request.link_collection(
                "issue_comments",
                qualifier.join("issue").join(&id).join("issue_comments"),
            )?;
            self.add_resource(
                request,
                "issue",
                "issue",
                &id,
                Overrides::none().url(href).qualifier(qualifier),
            )?;
        }
        Ok(())
    }

    /// An issue. Assignees become one multi-target resource link, and the
    /// twin pull request is linked under the issue's id.
    pub(crate) fn issue(&self, request: &mut Request) -> Result<(), ProcessError> {
        request.add_self_link()?;
        let qualifier = request.qualifier()?;
        request.link_siblings(qualifier.join("issues"))?;

        let assignees = request
            .document()?
            .get("assignees")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if !assignees.is_empty() {
            let urns = assignees
                .iter()
                .map(|assignee| {
                    assignee
                        .get("id")
                        .and_then(json_id)
                        .map(|id| Urn::root(ResourceKind::User, id))
                        .ok_or_else(|| request.missing("assignees.id"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            request.link_resources("assignees", urns)?;
        }

        self.add_root(request, "user", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "assignee", ResourceKind::User, Overrides::none())?;
        self.add_root(request, "closed_by", ResourceKind::User, Overrides::none())?;
        let repository_url = self.url_field(request, "repository_url")?;
        self.add_root(
            request,
            "repo",
            ResourceKind::Repo,
            Overrides::none().url(repository_url).urn(qualifier.clone()),
        )?;

        let comments_url = self.url_field(request, "comments_url")?;
        self.add_collection(
            request,
            "issue_comments",
            "issue_comment",
            Overrides::none().url(comments_url),
        )?;

        let pull_url = request
            .document()?
            .get("pull_request")
            .and_then(|pull| pull.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(pull_url) = pull_url {
            // Linked under the issue's id, not the PR's own id.
            let id = required_id(request, "id")?;
            self.add_resource(
                request,
                "pull_request",
                "pull_request",
                &id,
                Overrides::none().url(pull_url).qualifier(qualifier),
            )?;
        }
        Ok(())
    }

    /// Comment-shaped child documents: issue, review, pull, and commit
    /// comments. Siblings are the parent's `<kind>s` collection.
    pub(crate) fn comment(&self, request: &mut Request) -> Result<(), ProcessError> {
        let collection = format!("{}s", request.kind());
        self.authored_child(request, &collection, "user")
    }

    /// A pull request review.
    pub(crate) fn pull_review(&self, request: &mut Request) -> Result<(), ProcessError> {
        self.authored_child(request, "pull_reviews", "user")
    }

    /// A commit status.
    pub(crate) fn status(&self, request: &mut Request) -> Result<(), ProcessError> {
        self.authored_child(request, "statuses", "creator")
    }

    /// A deployment.
    pub(crate) fn deployment(&self, request: &mut Request) -> Result<(), ProcessError> {
        self.authored_child(request, "deployments", "creator")
    }

    /// A milestone.
    pub(crate) fn milestone(&self, request: &mut Request) -> Result<(), ProcessError> {
        self.authored_child(request, "milestones", "creator")
    }

    /// A GitHub Pages build.
    pub(crate) fn page_build(&self, request: &mut Request) -> Result<(), ProcessError> {
        self.authored_child(request, "page_builds", "pusher")
    }

    /// A team. Root-typed, but its siblings set is scoped to the owning
    /// organization.
    pub(crate) fn team(&self, request: &mut Request) -> Result<(), ProcessError> {
        request.add_root_self_link()?;
        let org_id = request
            .document()?
            .get("organization")
            .and_then(|org| org.get("id"))
            .and_then(json_id)
            .ok_or_else(|| request.missing("organization.id"))?;
        request.link_siblings(Urn::root(ResourceKind::Org, org_id).join("teams"))?;

        self.add_root(request, "organization", ResourceKind::Org, Overrides::none())?;
        let members_url = strip_template(&self.url_field(request, "members_url")?, "{/member}");
        self.add_relation(request, "members", "user", Overrides::none().url(members_url))?;
        let repositories_url = self.url_field(request, "repositories_url")?;
        self.add_relation(
            request,
            "repos",
            "repo",
            Overrides::none().url(repositories_url),
        )?;
        Ok(())
    }

    /// Shared shape of small child documents: self, a sibling collection on
    /// the parent, and a single authoring user.
    fn authored_child(
        &self,
        request: &mut Request,
        collection: &str,
        author: &str,
    ) -> Result<(), ProcessError> {
        request.add_self_link()?;
        let qualifier = request.qualifier()?;
        request.link_siblings(qualifier.join(collection))?;
        self.add_root(request, author, ResourceKind::User, Overrides::none())?;
        Ok(())
    }
}

/// Reads a required id field off the document as its string form.
fn required_id(request: &Request, field: &str) -> Result<String, ProcessError> {
    request
        .document()?
        .get(field)
        .and_then(json_id)
        .ok_or_else(|| request.missing(field))
}

/// Reads `_links.<name>.href`, the hypermedia block GitHub attaches to
/// pull requests.
fn link_href(links: &Value, name: &str) -> Option<String> {
    links
        .get(name)
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
