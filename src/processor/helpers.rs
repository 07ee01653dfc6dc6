//! Link-and-queue helpers shared by the resource handlers.
//!
//! Every handler declares its document's outgoing references through four
//! operations: a singular reference to a root resource, a singular
//! reference to a child resource, an owned collection, and a non-owned
//! relation. Each one records a typed link and derives the follow-up fetch
//! in a single call, so a handler cannot record a link without queueing its
//! target or vice versa.

use serde_json::Value;

use crate::types::{json_id, RelationDescriptor, Request, RequestContext, ResourceKind, Urn};

use super::{ProcessError, Processor};

/// Optional URL/URN/qualifier overrides for the link helpers.
///
/// Most call sites let the helper derive everything from the document; the
/// exceptions (rewritten URLs, template-stripped URLs, pinned URNs) pass an
/// override. Missing nested field plus missing overrides is a well-defined
/// no-op, not an error.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    url: Option<String>,
    urn: Option<Urn>,
    qualifier: Option<Urn>,
}

impl Overrides {
    /// No overrides; derive everything from the document.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn urn(mut self, urn: Urn) -> Self {
        self.urn = Some(urn);
        self
    }

    pub fn qualifier(mut self, qualifier: Urn) -> Self {
        self.qualifier = Some(qualifier);
        self
    }
}

impl Processor {
    /// Records a singular reference to a root resource and queues its fetch.
    ///
    /// Reads the nested object under `name` for the id and URL unless both
    /// were overridden. No nested object and incomplete overrides is a
    /// no-op: the field is optional on the document, so there is nothing to
    /// link.
    pub(crate) fn add_root(
        &self,
        request: &mut Request,
        name: &str,
        kind: ResourceKind,
        overrides: Overrides,
    ) -> Result<(), ProcessError> {
        let nested = request
            .document()?
            .get(name)
            .filter(|value| value.is_object())
            .cloned();
        if nested.is_none() && !(overrides.url.is_some() && overrides.urn.is_some()) {
            return Ok(());
        }

        let urn = match overrides.urn {
            Some(urn) => urn,
            None => {
                let id = nested
                    .as_ref()
                    .and_then(|n| n.get("id"))
                    .and_then(json_id)
                    .ok_or_else(|| request.missing(format!("{name}.id")))?;
                Urn::root(kind, id)
            }
        };
        let url = match overrides.url {
            Some(url) => url,
            None => nested
                .as_ref()
                .and_then(|n| n.get("url"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| request.missing(format!("{name}.url")))?,
        };

        request.link_resource(name, urn)?;
        request.queue_root(kind.as_str(), url);
        Ok(())
    }

    /// Records a singular reference to a child resource and queues its
    /// fetch under the current qualifier.
    pub(crate) fn add_resource(
        &self,
        request: &mut Request,
        name: &str,
        kind: &str,
        id: &str,
        overrides: Overrides,
    ) -> Result<(), ProcessError> {
        let qualifier = match overrides.qualifier {
            Some(qualifier) => qualifier,
            None => request.qualifier()?,
        };
        let urn = overrides
            .urn
            .unwrap_or_else(|| qualifier.join(name).join(id));
        let url = match overrides.url {
            Some(url) => url,
            None => self.url_field(request, &format!("{name}_url"))?,
        };

        request.link_resource(name, urn)?;
        request.queue_child(kind, url, qualifier);
        Ok(())
    }

    /// Records an owned collection and queues its traversal.
    ///
    /// The pages run under this document's qualifier with the element kind
    /// in their context; root element kinds produce root fetches per
    /// element, everything else produces child fetches.
    pub(crate) fn add_collection(
        &self,
        request: &mut Request,
        name: &str,
        kind: &str,
        overrides: Overrides,
    ) -> Result<(), ProcessError> {
        let qualifier = request.qualifier()?;
        let urn = overrides.urn.unwrap_or_else(|| qualifier.join(name));
        let url = match overrides.url {
            Some(url) => url,
            None => self.url_field(request, &format!("{name}_url"))?,
        };

        request.link_collection(name, urn)?;
        let context = RequestContext {
            qualifier: Some(qualifier),
            relation: None,
            element_type: Some(kind.to_string()),
            repo_type: None,
        };
        if ResourceKind::is_root_type(kind) {
            request.queue_roots(name, url, context);
        } else {
            request.queue_children(name, url, context);
        }
        Ok(())
    }

    /// Records a non-owned relation and queues a snapshot traversal.
    ///
    /// A fresh guid brands the snapshot: the relation link points at
    /// `<urn>:pages:<guid>`, and every page request carries the descriptor
    /// so the relation engine can mark the pages as one coherent set.
    pub(crate) fn add_relation(
        &self,
        request: &mut Request,
        name: &str,
        kind: &str,
        overrides: Overrides,
    ) -> Result<(), ProcessError> {
        let qualifier = request.qualifier()?;
        let urn = overrides.urn.unwrap_or_else(|| qualifier.join(name));
        let url = match overrides.url {
            Some(url) => url,
            None => self.url_field(request, &format!("{name}_url"))?,
        };

        let guid = self.new_guid();
        request.link_relation(name, urn.join("pages").join(guid))?;
        let context = RequestContext {
            qualifier: Some(qualifier),
            relation: Some(RelationDescriptor {
                origin: request.kind().to_string(),
                name: name.to_string(),
                kind: kind.to_string(),
                guid,
            }),
            element_type: None,
            repo_type: None,
        };
        request.queue_roots(name, url, context);
        Ok(())
    }

    /// Reads a required string field off the document.
    pub(crate) fn url_field(
        &self,
        request: &Request,
        field: &str,
    ) -> Result<String, ProcessError> {
        request
            .document()?
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| request.missing(field))
    }
}
