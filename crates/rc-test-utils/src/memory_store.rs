//! In-memory session store for audit-trail testing.
//!
//! Collects every persisted [`AuditRecord`] so tests can assert on the
//! exact audit trail a scenario produced. Clones share storage, which lets
//! a test keep one handle while the recorder task owns another.
//!
//! # Example
//!
//! ```rust,ignore
//! use rc_test_utils::MemorySessionStore;
//!
//! let store = MemorySessionStore::new();
//! let (recorder, task) = SessionRecorder::spawn(store.clone(), token);
//!
//! // ... drive the scenario, shut the recorder down ...
//!
//! assert_eq!(store.session_start_count(), 2);
//! assert_eq!(store.records_for_transport(transport_id).len(), 3);
//! ```

use common::types::TransportId;
use room_controller::recorder::{AuditRecord, SessionStore};
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Session store that keeps records in memory.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Records in persistence order
    records: Vec<AuditRecord>,
    /// When set, every persist fails with this message
    fail_message: Option<String>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner::default())),
        }
    }

    /// Make every persist fail with the given message.
    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.inner.lock().unwrap().fail_message = Some(message.into());
        self
    }

    /// Start failing persists mid-test.
    pub fn set_failure(&self, message: impl Into<String>) {
        self.inner.lock().unwrap().fail_message = Some(message.into());
    }

    /// Stop failing persists.
    pub fn clear_failure(&self) {
        self.inner.lock().unwrap().fail_message = None;
    }

    /// All records persisted so far, in order.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    /// Number of records persisted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// Whether nothing has been persisted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().records.is_empty()
    }

    /// Number of session-start records.
    #[must_use]
    pub fn session_start_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| matches!(r, AuditRecord::SessionStart { .. }))
            .count()
    }

    /// Number of session-end records.
    #[must_use]
    pub fn session_end_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| matches!(r, AuditRecord::SessionEnd { .. }))
            .count()
    }

    /// Number of event records.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| matches!(r, AuditRecord::Event { .. }))
            .count()
    }

    /// All records attributed to one transport, in order.
    #[must_use]
    pub fn records_for_transport(&self, transport_id: TransportId) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| match r {
                AuditRecord::SessionStart {
                    transport_id: t, ..
                }
                | AuditRecord::SessionEnd {
                    transport_id: t, ..
                }
                | AuditRecord::Event {
                    transport_id: t, ..
                } => *t == transport_id,
            })
            .cloned()
            .collect()
    }

    /// Discard everything persisted so far.
    pub fn clear(&self) {
        self.inner.lock().unwrap().records.clear();
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemorySessionStore {
    fn persist(&mut self, record: AuditRecord) -> impl Future<Output = anyhow::Result<()>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let mut guard = inner.lock().unwrap();
            if let Some(message) = guard.fail_message.clone() {
                anyhow::bail!("{message}");
            }
            guard.records.push(record);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::types::{ParticipantId, RoomId};
    use serde_json::json;

    fn start_record(transport_id: TransportId) -> AuditRecord {
        AuditRecord::SessionStart {
            participant_id: ParticipantId::from("alice"),
            transport_id,
            room_id: RoomId::from("standup"),
            joined_at: Utc::now(),
            meta: Some(json!({"client": "test"})),
        }
    }

    #[tokio::test]
    async fn test_persist_collects_records_in_order() {
        let mut store = MemorySessionStore::new();
        let transport_id = TransportId::new();

        store.persist(start_record(transport_id)).await.unwrap();
        store
            .persist(AuditRecord::SessionEnd {
                transport_id,
                left_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert!(matches!(
            store.records()[0],
            AuditRecord::SessionStart { .. }
        ));
        assert!(matches!(store.records()[1], AuditRecord::SessionEnd { .. }));
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let store = MemorySessionStore::new();
        let mut writer = store.clone();

        writer.persist(start_record(TransportId::new())).await.unwrap();

        assert_eq!(store.session_start_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mut store = MemorySessionStore::new().with_failure("disk full");

        let result = store.persist(start_record(TransportId::new())).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clearing_failure_resumes_persistence() {
        let mut store = MemorySessionStore::new().with_failure("down");

        assert!(store.persist(start_record(TransportId::new())).await.is_err());

        store.clear_failure();
        store.persist(start_record(TransportId::new())).await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_records_for_transport_filters() {
        let mut store = MemorySessionStore::new();
        let ours = TransportId::new();
        let theirs = TransportId::new();

        store.persist(start_record(ours)).await.unwrap();
        store.persist(start_record(theirs)).await.unwrap();
        store
            .persist(AuditRecord::Event {
                transport_id: ours,
                event_type: "screen-share-started".to_string(),
                data: json!({}),
            })
            .await
            .unwrap();

        let records = store.records_for_transport(ours);
        assert_eq!(records.len(), 2);
        assert_eq!(store.records_for_transport(theirs).len(), 1);
    }

    #[tokio::test]
    async fn test_type_counts() {
        let mut store = MemorySessionStore::new();
        let transport_id = TransportId::new();

        store.persist(start_record(transport_id)).await.unwrap();
        store
            .persist(AuditRecord::Event {
                transport_id,
                event_type: "mute-changed".to_string(),
                data: json!({"muted": true}),
            })
            .await
            .unwrap();
        store
            .persist(AuditRecord::SessionEnd {
                transport_id,
                left_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(store.session_start_count(), 1);
        assert_eq!(store.event_count(), 1);
        assert_eq!(store.session_end_count(), 1);
    }
}
