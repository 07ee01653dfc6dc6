//! Processing policies.
//!
//! A policy decides whether a fetched request should be processed by a given
//! processor version. Policies travel with requests: follow-up requests
//! inherit the policy of the request that derived them, so an operator can
//! scope a traversal (for example "reprocess only what an older version
//! produced") at the seed request and have it apply to the whole subtree.

use std::fmt;

use crate::types::Request;

/// Decides whether a request should be processed.
pub trait Policy: Send + Sync + fmt::Debug {
    /// Returns true if this `(request, version)` pair should be processed.
    ///
    /// Returning false is not an error; the processor marks the request
    /// skipped and leaves the document untouched.
    fn should_process(&self, request: &Request, version: u32) -> bool;
}

/// Processes everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {
    fn should_process(&self, _request: &Request, _version: u32) -> bool {
        true
    }
}

/// Processes a document only when it has not yet been processed by the
/// current version.
///
/// Useful for re-crawls: documents stamped by an equal or newer processor
/// are skipped, everything else is brought up to date.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionGatedPolicy;

impl Policy for VersionGatedPolicy {
    fn should_process(&self, request: &Request, version: u32) -> bool {
        match request
            .document_opt()
            .and_then(|doc| doc.metadata().version)
        {
            Some(stored) => stored < version,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;
    use serde_json::json;

    fn request_with_version(version: Option<u32>) -> Request {
        let mut doc = Document::new("org", "u", json!({"id": 1}));
        doc.metadata_mut().version = version;
        Request::new("org", "u").with_document(doc)
    }

    #[test]
    fn default_policy_accepts_everything() {
        assert!(DefaultPolicy.should_process(&Request::new("org", "u"), 0));
        assert!(DefaultPolicy.should_process(&request_with_version(Some(99)), 1));
    }

    #[test]
    fn version_gate_skips_current_and_newer() {
        let policy = VersionGatedPolicy;
        assert!(!policy.should_process(&request_with_version(Some(13)), 13));
        assert!(!policy.should_process(&request_with_version(Some(14)), 13));
        assert!(policy.should_process(&request_with_version(Some(12)), 13));
    }

    #[test]
    fn version_gate_accepts_unprocessed_documents() {
        let policy = VersionGatedPolicy;
        assert!(policy.should_process(&request_with_version(None), 13));
        assert!(policy.should_process(&Request::new("org", "u"), 13));
    }
}
