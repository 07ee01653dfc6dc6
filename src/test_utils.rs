//! Shared test utilities and arbitrary generators for property-based testing.

use std::sync::Arc;

use proptest::prelude::*;
use uuid::Uuid;

use crate::processor::Processor;
use crate::store::InMemoryStore;
use crate::types::urn::{ResourceKind, Urn};

/// The guid every relation gets under [`fixed_guid_processor`].
pub const FIXED_GUID: &str = "00000000-0000-4000-8000-000000000001";

/// A processor over an empty in-memory store whose relation guids are all
/// [`FIXED_GUID`], so link sets can be asserted exactly.
pub fn fixed_guid_processor() -> Processor {
    let guid: Uuid = FIXED_GUID.parse().expect("fixed guid literal");
    Processor::new(Arc::new(InMemoryStore::new())).with_guid_source(Arc::new(move || guid))
}

pub fn arb_resource_kind() -> impl Strategy<Value = ResourceKind> {
    prop_oneof![
        Just(ResourceKind::User),
        Just(ResourceKind::Org),
        Just(ResourceKind::Repo),
        Just(ResourceKind::Team),
    ]
}

pub fn arb_root_urn() -> impl Strategy<Value = Urn> {
    (arb_resource_kind(), any::<u64>()).prop_map(|(kind, id)| Urn::root(kind, id))
}

pub fn arb_qualifier() -> impl Strategy<Value = Urn> {
    (arb_root_urn(), prop::collection::vec("[a-z_]{1,12}", 0..3)).prop_map(|(root, segments)| {
        segments
            .into_iter()
            .fold(root, |urn, segment| urn.join(segment))
    })
}
