//! The relation engine.
//!
//! A relation is a non-owned association between a resource and a set (an
//! org's members, a repo's collaborators). Sets are traversed page by page,
//! and membership only makes sense as a coherent snapshot: the pages of one
//! traversal are branded with the guid generated when the relation was
//! declared. Consumers reconstruct current membership by unioning the
//! `unique` pages that share a guid; pages of older snapshots keep their
//! own guid and stay distinguishable.

use crate::types::{RelationDescriptor, Request, Urn};

use super::pagination::element_id;
use super::{ProcessError, Processor};

impl Processor {
    /// Records the relation markings on one page of a traversal.
    ///
    /// - `origin` and `<relation.origin>` resource links point back at the
    ///   declaring document (the second is redundant but carries the
    ///   origin's type as the link name),
    /// - `siblings` covers every page of every snapshot,
    /// - the `unique` collection covers this snapshot only,
    /// - `resources` lists the URN of every element on this page.
    pub(crate) fn process_relation(
        &self,
        request: &mut Request,
        relation: &RelationDescriptor,
    ) -> Result<(), ProcessError> {
        let qualifier = request.qualifier()?;
        request.link_resource("origin", qualifier.clone())?;
        request.link_resource(&relation.origin, qualifier.clone())?;

        let pages = qualifier.join(&relation.name).join("pages");
        request.link_siblings(pages.clone())?;
        request.link_collection("unique", pages.join(relation.guid))?;

        let elements = request
            .document()?
            .elements()
            .ok_or_else(|| request.missing("elements"))?
            .clone();
        let urns = elements
            .iter()
            .map(|element| Ok(Urn::typed(&relation.kind, element_id(request, element)?)))
            .collect::<Result<Vec<_>, ProcessError>>()?;
        request.link_resources("resources", urns)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixed_guid_processor, FIXED_GUID};
    use crate::types::{Document, LinkValue, RequestContext};
    use serde_json::json;
    use uuid::Uuid;

    fn members_page(guid: Uuid) -> Request {
        Request::new("members", "https://api.github.com/orgs/acme/members")
            .with_context(RequestContext {
                qualifier: Some(Urn::typed("org", 7)),
                relation: Some(RelationDescriptor {
                    origin: "org".to_string(),
                    name: "members".to_string(),
                    kind: "user".to_string(),
                    guid,
                }),
                ..Default::default()
            })
            .with_document(Document::new(
                "members",
                "https://api.github.com/orgs/acme/members",
                json!([
                    {"id": 1, "url": "https://api.github.com/users/a"},
                    {"id": 2, "url": "https://api.github.com/users/b"},
                ]),
            ))
    }

    #[test]
    fn relation_page_records_all_markings() {
        let processor = fixed_guid_processor();
        let guid: Uuid = FIXED_GUID.parse().unwrap();
        let mut request = members_page(guid);
        let relation = request.context.relation.clone().unwrap();
        processor.process_relation(&mut request, &relation).unwrap();

        let doc = request.document().unwrap();
        assert_eq!(
            doc.link("origin").unwrap().href().unwrap().as_str(),
            "urn:org:7"
        );
        assert_eq!(
            doc.link("org").unwrap().href().unwrap().as_str(),
            "urn:org:7"
        );
        assert_eq!(
            doc.link("siblings").unwrap().href().unwrap().as_str(),
            "urn:org:7:members:pages"
        );
        assert_eq!(
            doc.link("unique").unwrap().href().unwrap().as_str(),
            format!("urn:org:7:members:pages:{FIXED_GUID}")
        );
        let resources = doc.link("resources").unwrap();
        assert!(matches!(resources, LinkValue::Resource { .. }));
        let urns: Vec<_> = resources.hrefs().iter().map(|u| u.as_str()).collect();
        assert_eq!(urns, vec!["urn:user:1", "urn:user:2"]);
    }

    #[test]
    fn pages_of_one_traversal_share_guid_and_siblings() {
        let processor = fixed_guid_processor();
        let guid = Uuid::parse_str(FIXED_GUID).unwrap();

        let mut page1 = members_page(guid);
        let mut page2 = members_page(guid);
        let relation = page1.context.relation.clone().unwrap();
        processor.process_relation(&mut page1, &relation).unwrap();
        processor.process_relation(&mut page2, &relation).unwrap();

        let unique1 = page1.document().unwrap().link("unique").unwrap().href().unwrap().clone();
        let unique2 = page2.document().unwrap().link("unique").unwrap().href().unwrap().clone();
        assert_eq!(unique1, unique2);
        assert_eq!(
            page1.document().unwrap().link("siblings"),
            page2.document().unwrap().link("siblings")
        );
    }

    #[test]
    fn distinct_snapshots_never_alias() {
        let processor = fixed_guid_processor();
        let guid_a = Uuid::parse_str("11111111-1111-4111-8111-111111111111").unwrap();
        let guid_b = Uuid::parse_str("22222222-2222-4222-8222-222222222222").unwrap();

        let mut page_a = members_page(guid_a);
        let mut page_b = members_page(guid_b);
        let rel_a = page_a.context.relation.clone().unwrap();
        let rel_b = page_b.context.relation.clone().unwrap();
        processor.process_relation(&mut page_a, &rel_a).unwrap();
        processor.process_relation(&mut page_b, &rel_b).unwrap();

        assert_ne!(
            page_a.document().unwrap().link("unique"),
            page_b.document().unwrap().link("unique")
        );
        // Siblings still cover all snapshots.
        assert_eq!(
            page_a.document().unwrap().link("siblings"),
            page_b.document().unwrap().link("siblings")
        );
    }

    #[test]
    fn element_without_id_fails_loudly() {
        let processor = fixed_guid_processor();
        let guid = Uuid::parse_str(FIXED_GUID).unwrap();
        let mut request = members_page(guid);
        *request.document_mut().unwrap().body_mut() =
            json!([{"url": "https://api.github.com/users/a"}]);
        let relation = request.context.relation.clone().unwrap();
        let err = processor.process_relation(&mut request, &relation).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::MissingField { ref field, .. } if field == "element.id"
        ));
    }
}
