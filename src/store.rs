//! The document store seam.
//!
//! The processor reads from the store in exactly one place: event discovery
//! asks for the etag of each event URL to decide which events are new. The
//! store itself (blob persistence, etag indexing) is an external
//! collaborator; any implementation of [`DocumentStore`] satisfies the
//! contract. An in-memory implementation is provided for tests and small
//! deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by a store backend.
///
/// Store failures during event discovery propagate and fail the request
/// being processed; the orchestrator decides on retry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to answer the lookup.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Read access to the crawl document store.
///
/// Implementations must be safe for concurrent use; the processor holds the
/// store behind an `Arc` and many requests may be processed in parallel.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the stored etag for `(doc_type, url)`, or `None` if the
    /// resource has never been stored.
    async fn etag(&self, doc_type: &str, url: &str) -> Result<Option<String>, StoreError>;
}

/// A `HashMap`-backed store for tests and small deployments.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    etags: RwLock<HashMap<(String, String), String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an etag, as the fetch pipeline would after storing a body.
    pub async fn insert_etag(
        &self,
        doc_type: impl Into<String>,
        url: impl Into<String>,
        etag: impl Into<String>,
    ) {
        self.etags
            .write()
            .await
            .insert((doc_type.into(), url.into()), etag.into());
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn etag(&self, doc_type: &str, url: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .etags
            .read()
            .await
            .get(&(doc_type.to_string(), url.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_entry_yields_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.etag("event", "https://x.test/1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn inserted_etag_is_returned() {
        let store = InMemoryStore::new();
        store.insert_etag("event", "https://x.test/1", "\"abc\"").await;
        assert_eq!(
            store.etag("event", "https://x.test/1").await.unwrap(),
            Some("\"abc\"".to_string())
        );
    }

    #[tokio::test]
    async fn lookups_are_keyed_by_type_and_url() {
        let store = InMemoryStore::new();
        store.insert_etag("event", "https://x.test/1", "\"abc\"").await;
        assert_eq!(store.etag("issue", "https://x.test/1").await.unwrap(), None);
        assert_eq!(store.etag("event", "https://x.test/2").await.unwrap(), None);
    }
}
