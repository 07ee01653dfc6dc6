//! The crawl queue seam.
//!
//! Follow-up requests derived during processing are pushed onto a queue set
//! with one of three priorities. The backend (in-memory, message bus) is an
//! external collaborator; any implementation of [`QueueSet`] satisfies the
//! contract. The provided [`InMemoryQueueSet`] orders requests by priority,
//! then FIFO within a priority level via monotone sequence numbers.
//!
//! # Priority Levels
//!
//! - `Immediate`: event feed refreshes, which go stale fastest
//! - `Soon`: remaining pages of a paginated collection, queued before the
//!   page contents shift under the crawl
//! - `Normal`: everything else

use std::collections::BinaryHeap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::{Outbound, Request};

/// Queue priority level.
///
/// Higher-priority requests are popped before lower-priority requests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    /// Default priority for most derived requests.
    #[default]
    Normal = 0,
    /// Remaining pages of a collection being traversed.
    Soon = 1,
    /// Event feed refreshes.
    Immediate = 2,
}

/// A prioritized crawl queue.
///
/// Implementations must be safe for concurrent use: the processor's caller
/// pushes from many tasks, workers pop concurrently.
pub trait QueueSet: Send + Sync {
    /// Pushes a batch of requests at one priority, preserving their order.
    fn push(&self, requests: Vec<Request>, priority: QueuePriority);

    /// Pops the highest-priority request, FIFO within a priority level.
    fn pop(&self) -> Option<Request>;

    /// Returns the number of queued requests.
    fn len(&self) -> usize;

    /// Returns true if nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drains a processed request's derived follow-ups into a queue set.
///
/// Requests are grouped by priority with their derivation order preserved
/// within each group, then bulk-pushed.
pub fn enqueue_outbound(queue: &dyn QueueSet, outbound: Vec<Outbound>) {
    let mut immediate = Vec::new();
    let mut soon = Vec::new();
    let mut normal = Vec::new();
    for entry in outbound {
        match entry.priority {
            QueuePriority::Immediate => immediate.push(entry.request),
            QueuePriority::Soon => soon.push(entry.request),
            QueuePriority::Normal => normal.push(entry.request),
        }
    }
    for (batch, priority) in [
        (immediate, QueuePriority::Immediate),
        (soon, QueuePriority::Soon),
        (normal, QueuePriority::Normal),
    ] {
        if !batch.is_empty() {
            queue.push(batch, priority);
        }
    }
}

/// An entry in the in-memory queue.
///
/// Requests are ordered by priority first, then by sequence number (lower
/// first) so requests at the same priority pop in insertion order.
struct QueuedRequest {
    request: Request,
    priority: QueuePriority,
    sequence: u64,
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher priority first; BinaryHeap is a max-heap, so the sequence
        // comparison is reversed for FIFO within a priority level.
        match self.priority.cmp(&other.priority) {
            std::cmp::Ordering::Equal => other.sequence.cmp(&self.sequence),
            ordering => ordering,
        }
    }
}

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<QueuedRequest>,
    next_sequence: u64,
}

/// A heap-backed queue set for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryQueueSet {
    inner: Mutex<QueueInner>,
}

impl InMemoryQueueSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueSet for InMemoryQueueSet {
    fn push(&self, requests: Vec<Request>, priority: QueuePriority) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        for request in requests {
            let sequence = inner.next_sequence;
            inner.next_sequence += 1;
            inner.heap.push(QueuedRequest {
                request,
                priority,
                sequence,
            });
        }
    }

    fn pop(&self) -> Option<Request> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.heap.pop().map(|entry| entry.request)
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").heap.len()
    }
}
