//! The request ledger: concurrency-control bookkeeping for in-flight
//! requests.
//!
//! The ledger maps namespace keys to buckets of [`RequestRecord`]s. It
//! governs cancellation-by-replacement: registering a non-concurrent request
//! into an existing named bucket flips every sibling's status to
//! `Cancelled`. That flip is pull-based: nothing interrupts an in-flight
//! sibling; the sibling observes it at its own classification checkpoint.
//!
//! Two invariants hold at all times:
//! - no namespace key maps to an empty bucket (the bucket is dropped when
//!   its last record is cleared)
//! - request ids are globally unique across the whole ledger

use chrono::{DateTime, Utc};
use reqcycle_core::directive::{CancelHandle, NamespaceKey};
use reqcycle_core::event::RequestId;
use std::collections::HashMap;
use std::fmt;

/// Status of a tracked request. Monotonic: a record never returns to
/// `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Registered, transport work not yet settled.
    Pending,
    /// Settled successfully.
    Fulfilled,
    /// Settled with a failure.
    Rejected,
    /// Cancelled by a sibling registration.
    Cancelled,
}

/// One tracked request.
pub struct RequestRecord {
    /// Id of the request.
    pub uid: RequestId,
    /// When the request was registered.
    pub requested_at: DateTime<Utc>,
    /// Current status.
    pub status: RequestStatus,
    /// Caller-supplied abort hook. Stored, never invoked by the ledger.
    pub cancel: Option<CancelHandle>,
}

impl fmt::Debug for RequestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRecord")
            .field("uid", &self.uid)
            .field("requested_at", &self.requested_at)
            .field("status", &self.status)
            .field("cancel", &self.cancel.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// In-memory registry of active request records, keyed by namespace then
/// request id.
#[derive(Debug, Default)]
pub struct RequestLedger {
    buckets: HashMap<NamespaceKey, HashMap<RequestId, RequestRecord>>,
}

impl RequestLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new request under `key`.
    ///
    /// If the bucket already exists, is named, and `concurrent` is an
    /// explicit `false`, every existing record in the bucket is marked
    /// `Cancelled` first. Generic-bucket siblings are never cancelled. The
    /// new record is always inserted as `Pending`. No cancel handle is
    /// invoked here; only recorded statuses change.
    pub fn register(
        &mut self,
        key: &NamespaceKey,
        uid: RequestId,
        concurrent: Option<bool>,
        cancel: Option<CancelHandle>,
    ) {
        let record = RequestRecord {
            uid,
            requested_at: Utc::now(),
            status: RequestStatus::Pending,
            cancel,
        };

        if let Some(bucket) = self.buckets.get_mut(key) {
            if *key != NamespaceKey::Generic && concurrent == Some(false) {
                tracing::debug!(
                    namespace = %key,
                    request_id = %uid,
                    cancelled = bucket.len(),
                    "cancelling siblings for non-concurrent registration"
                );
                for sibling in bucket.values_mut() {
                    sibling.status = RequestStatus::Cancelled;
                }
            }
            bucket.insert(uid, record);
        } else {
            let mut bucket = HashMap::new();
            bucket.insert(uid, record);
            self.buckets.insert(key.clone(), bucket);
        }

        tracing::debug!(namespace = %key, request_id = %uid, "registered request");
    }

    /// Current status of a tracked request.
    #[must_use]
    pub fn status(&self, key: &NamespaceKey, uid: RequestId) -> Option<RequestStatus> {
        self.buckets
            .get(key)
            .and_then(|bucket| bucket.get(&uid))
            .map(|record| record.status)
    }

    /// Abort hook stored for a tracked request, if any.
    ///
    /// The ledger never invokes the handle itself; callers that want to
    /// abort the underlying transport call fetch it here.
    #[must_use]
    pub fn cancel_handle(&self, key: &NamespaceKey, uid: RequestId) -> Option<CancelHandle> {
        self.buckets
            .get(key)
            .and_then(|bucket| bucket.get(&uid))
            .and_then(|record| record.cancel.clone())
    }

    /// Stop tracking a request. Idempotent; clearing an absent record or
    /// bucket is a no-op. Drops the bucket when it empties.
    pub fn clear(&mut self, key: &NamespaceKey, uid: RequestId) {
        if let Some(bucket) = self.buckets.get_mut(key) {
            bucket.remove(&uid);
            if bucket.is_empty() {
                self.buckets.remove(key);
            }
            tracing::debug!(namespace = %key, request_id = %uid, "cleared request");
        }
    }

    /// Administrative reset: drop every record and bucket.
    pub fn clear_all(&mut self) {
        self.buckets.clear();
    }

    /// Total number of tracked requests across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashMap::len).sum()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Whether a bucket exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &NamespaceKey) -> bool {
        self.buckets.contains_key(key)
    }

    /// Statuses of every record in a bucket, in no particular order.
    #[must_use]
    pub fn statuses(&self, key: &NamespaceKey) -> Vec<RequestStatus> {
        self.buckets
            .get(key)
            .map(|bucket| bucket.values().map(|record| record.status).collect())
            .unwrap_or_default()
    }
}
