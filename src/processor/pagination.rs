//! The pagination engine.
//!
//! GitHub collection endpoints return up to 100 elements per page and
//! advertise the page set in the `Link:` response header. The collection
//! processor fans the remaining pages out onto the `soon` priority before
//! processing page one, so queue back-pressure is visible early and the
//! pages are fetched before the collection shifts under the crawl.

use tracing::debug;
use url::Url;

use crate::github::parse_link_header;
use crate::queue::QueuePriority;
use crate::types::{json_id, Request};

use super::{ProcessError, Processor};

/// Page size requested for fanned-out pages.
const PER_PAGE: u32 = 100;

impl Processor {
    /// Processes the first fetch of a collection.
    ///
    /// If the response's link header advertises a last page `K`, one
    /// request per page in `[2, K]` is queued on `soon`, each preserving
    /// the original type, context, and policy. The current response is then
    /// processed as page one.
    pub(crate) fn collection(&self, request: &mut Request) -> Result<(), ProcessError> {
        let link_header = request
            .response()
            .and_then(|response| response.link_header.clone());
        if let Some(header) = link_header {
            let links = parse_link_header(&header)?;
            if let Some(last) = links.last {
                debug!(kind = %request.kind(), last, "fanning out collection pages");
                let mut pages = Vec::new();
                for page in 2..=last {
                    let url = page_url(request.url(), page)?;
                    pages.push(
                        Request::new(request.kind(), url)
                            .with_context(request.context.clone())
                            .with_policy(request.policy().clone()),
                    );
                }
                request.queue_requests(pages, QueuePriority::Soon);
            }
        }
        self.page(1, request)
    }

    /// Processes one page of a collection.
    ///
    /// Records `self = <qualifier>:<type>:page:<n>`. A page participating
    /// in a relation traversal runs the relation engine first, and the
    /// relation's element kind wins over the context's. Each element of the
    /// page body is then queued: root kinds as root fetches, child kinds
    /// scoped under the page's qualifier.
    pub(crate) fn page(&self, page: u32, request: &mut Request) -> Result<(), ProcessError> {
        let qualifier = request.qualifier()?;
        request.link_self(qualifier.join(request.kind()).join("page").join(page))?;

        let element_type = match request.context.relation.clone() {
            Some(relation) => {
                self.process_relation(request, &relation)?;
                Some(relation.kind)
            }
            None => request.context.element_type.clone(),
        };

        let Some(element_type) = element_type else {
            return Ok(());
        };
        let elements = request
            .document()?
            .elements()
            .ok_or_else(|| request.missing("elements"))?
            .clone();
        for element in &elements {
            let url = element
                .get("url")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| request.missing("element.url"))?
                .to_string();
            request.queue_collection_element(&element_type, url, qualifier.clone());
        }
        debug!(
            kind = %request.kind(),
            page,
            elements = elements.len(),
            %element_type,
            "processed collection page"
        );
        Ok(())
    }
}

/// Builds the URL of one fanned-out page: `<base>?page=<n>&per_page=100`.
fn page_url(base: &str, page: u32) -> Result<String, ProcessError> {
    let mut url = Url::parse(base).map_err(|source| ProcessError::Url {
        url: base.to_string(),
        source,
    })?;
    url.query_pairs_mut()
        .clear()
        .append_pair("page", &page.to_string())
        .append_pair("per_page", &PER_PAGE.to_string());
    Ok(url.into())
}

/// Reads the id every relation page element must carry.
pub(crate) fn element_id(
    request: &Request,
    element: &serde_json::Value,
) -> Result<String, ProcessError> {
    element
        .get("id")
        .and_then(json_id)
        .ok_or_else(|| request.missing("element.id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixed_guid_processor;
    use crate::types::{Document, RequestContext, ResponseInfo, Urn};
    use serde_json::json;

    fn repos_request(link_header: Option<&str>) -> Request {
        let mut request = Request::new("repos", "https://api.github.com/orgs/acme/repos")
            .with_context(RequestContext {
                qualifier: Some(Urn::typed("org", 7)),
                element_type: Some("repo".to_string()),
                ..Default::default()
            })
            .with_document(Document::new(
                "repos",
                "https://api.github.com/orgs/acme/repos",
                json!([
                    {"id": 1, "url": "https://api.github.com/repos/acme/a"},
                    {"id": 2, "url": "https://api.github.com/repos/acme/b"},
                ]),
            ));
        if let Some(header) = link_header {
            request = request.with_response(ResponseInfo {
                link_header: Some(header.to_string()),
                etag: None,
            });
        }
        request
    }

    const LAST_3: &str = "<https://api.github.com/orgs/acme/repos?page=2>; rel=\"next\", \
         <https://api.github.com/orgs/acme/repos?page=3>; rel=\"last\"";

    // ─── Fan-out ───

    #[test]
    fn fans_out_remaining_pages_on_soon() {
        let processor = fixed_guid_processor();
        let mut request = repos_request(Some(LAST_3));
        processor.collection(&mut request).unwrap();

        let pages: Vec<_> = request
            .outbound()
            .iter()
            .filter(|o| o.priority == QueuePriority::Soon)
            .collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages[0].request.url(),
            "https://api.github.com/orgs/acme/repos?page=2&per_page=100"
        );
        assert_eq!(
            pages[1].request.url(),
            "https://api.github.com/orgs/acme/repos?page=3&per_page=100"
        );
        for page in pages {
            assert_eq!(page.request.kind(), "repos");
            assert_eq!(page.request.context, request.context);
        }
    }

    #[test]
    fn pages_are_queued_before_elements() {
        let processor = fixed_guid_processor();
        let mut request = repos_request(Some(LAST_3));
        processor.collection(&mut request).unwrap();

        let priorities: Vec<_> = request.outbound().iter().map(|o| o.priority).collect();
        assert_eq!(
            priorities,
            vec![
                QueuePriority::Soon,
                QueuePriority::Soon,
                QueuePriority::Normal,
                QueuePriority::Normal,
            ]
        );
    }

    #[test]
    fn no_link_header_means_no_fan_out() {
        let processor = fixed_guid_processor();
        let mut request = repos_request(None);
        processor.collection(&mut request).unwrap();
        assert!(request
            .outbound()
            .iter()
            .all(|o| o.priority == QueuePriority::Normal));
    }

    #[test]
    fn header_without_last_means_no_fan_out() {
        let processor = fixed_guid_processor();
        let mut request =
            repos_request(Some("<https://api.github.com/orgs/acme/repos?page=1>; rel=\"first\""));
        processor.collection(&mut request).unwrap();
        assert_eq!(request.outbound().len(), 2); // just the two elements
    }

    // ─── Page processing ───

    #[test]
    fn page_records_qualified_self_link() {
        let processor = fixed_guid_processor();
        let mut request = repos_request(None);
        processor.collection(&mut request).unwrap();
        assert_eq!(
            request.document().unwrap().self_href().unwrap().as_str(),
            "urn:org:7:repos:page:1"
        );
    }

    #[test]
    fn page_queues_root_elements_as_roots() {
        let processor = fixed_guid_processor();
        let mut request = repos_request(None);
        processor.collection(&mut request).unwrap();

        let out = request.outbound();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].request.kind(), "repo");
        assert_eq!(out[0].request.url(), "https://api.github.com/repos/acme/a");
        assert_eq!(out[0].request.context.qualifier, None);
    }

    #[test]
    fn page_queues_child_elements_under_qualifier() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("issues", "https://api.github.com/repos/acme/a/issues")
            .with_context(RequestContext {
                qualifier: Some(Urn::typed("repo", 1)),
                element_type: Some("issue".to_string()),
                ..Default::default()
            })
            .with_document(Document::new(
                "issues",
                "https://api.github.com/repos/acme/a/issues",
                json!([{"id": 7, "url": "https://api.github.com/repos/acme/a/issues/7"}]),
            ));
        processor.collection(&mut request).unwrap();

        let child = &request.outbound()[0].request;
        assert_eq!(child.kind(), "issue");
        assert_eq!(
            child.context.qualifier.as_ref().unwrap().as_str(),
            "urn:repo:1"
        );
    }

    #[test]
    fn page_without_element_type_queues_nothing() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("repos", "https://x.test/repos")
            .with_context(RequestContext::qualified(Urn::typed("org", 7)))
            .with_document(Document::new("repos", "u", json!([{"id": 1, "url": "https://x.test/r/1"}])));
        processor.collection(&mut request).unwrap();
        assert!(request.outbound().is_empty());
    }

    #[test]
    fn later_pages_record_their_number() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("repos", "https://x.test/repos?page=3&per_page=100")
            .with_context(RequestContext {
                qualifier: Some(Urn::typed("org", 7)),
                element_type: Some("repo".to_string()),
                ..Default::default()
            })
            .with_document(Document::new("repos", "u", json!([])));
        processor.page(3, &mut request).unwrap();
        assert_eq!(
            request.document().unwrap().self_href().unwrap().as_str(),
            "urn:org:7:repos:page:3"
        );
    }

    #[test]
    fn element_without_url_fails_loudly() {
        let processor = fixed_guid_processor();
        let mut request = Request::new("repos", "https://x.test/repos")
            .with_context(RequestContext {
                qualifier: Some(Urn::typed("org", 7)),
                element_type: Some("repo".to_string()),
                ..Default::default()
            })
            .with_document(Document::new("repos", "u", json!([{"id": 1}])));
        let err = processor.collection(&mut request).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::MissingField { ref field, .. } if field == "element.url"
        ));
    }

    #[test]
    fn page_url_replaces_existing_query() {
        assert_eq!(
            page_url("https://x.test/repos?per_page=30", 2).unwrap(),
            "https://x.test/repos?page=2&per_page=100"
        );
    }
}
