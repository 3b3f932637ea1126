//! Section State Store: the system of record for documents and their section records.
//!
//! Every section write except `put_record` is a compare-and-swap: the caller states the
//! state (and attempt) it observed, and the write lands only if that is still current.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
#[cfg(test)]
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::document::Document;
use crate::sections::error::StoreError;
use crate::sections::models::{SectionDescriptor, SectionId, SectionRecord, Transition};
#[cfg(test)]
use crate::sections::state_machine::validate_transition;

#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn create_document(&self, document: &Document) -> Result<(), StoreError>;

    async fn get_document(&self, document_id: Uuid) -> Result<Document, StoreError>;

    async fn update_document(&self, document: &Document) -> Result<(), StoreError>;

    /// Creates a `locked` record for every descriptor that has none yet. Existing records
    /// are left untouched. Returns the document's records in canonical order.
    async fn init_sections(
        &self,
        document_id: Uuid,
        descriptors: &[SectionDescriptor],
    ) -> Result<Vec<SectionRecord>, StoreError>;

    async fn get_section(
        &self,
        document_id: Uuid,
        section_id: SectionId,
    ) -> Result<SectionRecord, StoreError>;

    /// All records of a document in canonical section order.
    async fn list_sections(&self, document_id: Uuid) -> Result<Vec<SectionRecord>, StoreError>;

    /// Conditional write. Fails with `Conflict` if the record moved since it was observed,
    /// or `IllegalTransition` if the state machine forbids the move.
    async fn transition(
        &self,
        document_id: Uuid,
        section_id: SectionId,
        transition: Transition,
    ) -> Result<SectionRecord, StoreError>;

    /// Unconditional upsert. Only the legacy sequential path uses this.
    async fn put_record(&self, record: &SectionRecord) -> Result<(), StoreError>;
}

/// Builds the `Conflict` error for a CAS that found the record somewhere else.
pub(crate) fn conflict(transition: &Transition, current: &SectionRecord) -> StoreError {
    StoreError::Conflict {
        section_id: current.section_id,
        expected: transition.from,
        actual: current.state,
    }
}

#[cfg(test)]
#[derive(Default)]
struct Inner {
    documents: HashMap<Uuid, Document>,
    sections: HashMap<(Uuid, SectionId), SectionRecord>,
}

/// Process-local store for tests. The whole CAS runs under one lock.
#[cfg(test)]
#[derive(Default)]
pub struct InMemorySectionStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

#[cfg(test)]
impl InMemorySectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with `Unavailable`, for exercising degraded paths.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
fn sorted(mut records: Vec<SectionRecord>) -> Vec<SectionRecord> {
    records.sort_by_key(|r| r.section_id);
    records
}

#[cfg(test)]
#[async_trait]
impl SectionStore for InMemorySectionStore {
    async fn create_document(&self, document: &Document) -> Result<(), StoreError> {
        self.check_available()?;
        self.inner
            .lock()
            .documents
            .insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Document, StoreError> {
        self.check_available()?;
        self.inner
            .lock()
            .documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))
    }

    async fn update_document(&self, document: &Document) -> Result<(), StoreError> {
        self.check_available()?;
        let mut inner = self.inner.lock();
        match inner.documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("document {}", document.id))),
        }
    }

    async fn init_sections(
        &self,
        document_id: Uuid,
        descriptors: &[SectionDescriptor],
    ) -> Result<Vec<SectionRecord>, StoreError> {
        self.check_available()?;
        let mut inner = self.inner.lock();
        for descriptor in descriptors {
            inner
                .sections
                .entry((document_id, descriptor.id))
                .or_insert_with(|| SectionRecord::locked(document_id, descriptor));
        }
        let records = inner
            .sections
            .values()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        Ok(sorted(records))
    }

    async fn get_section(
        &self,
        document_id: Uuid,
        section_id: SectionId,
    ) -> Result<SectionRecord, StoreError> {
        self.check_available()?;
        self.inner
            .lock()
            .sections
            .get(&(document_id, section_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("section {document_id}/{section_id}")))
    }

    async fn list_sections(&self, document_id: Uuid) -> Result<Vec<SectionRecord>, StoreError> {
        self.check_available()?;
        let records = self
            .inner
            .lock()
            .sections
            .values()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        Ok(sorted(records))
    }

    async fn transition(
        &self,
        document_id: Uuid,
        section_id: SectionId,
        transition: Transition,
    ) -> Result<SectionRecord, StoreError> {
        self.check_available()?;
        validate_transition(transition.from, transition.to)?;

        let mut inner = self.inner.lock();
        let record = inner
            .sections
            .get_mut(&(document_id, section_id))
            .ok_or_else(|| StoreError::NotFound(format!("section {document_id}/{section_id}")))?;

        if !transition.matches(record) {
            return Err(conflict(&transition, record));
        }
        transition.apply(record);
        Ok(record.clone())
    }

    async fn put_record(&self, record: &SectionRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.inner
            .lock()
            .sections
            .insert((record.document_id, record.section_id), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Map;

    use super::*;
    use crate::sections::models::{SectionError, SectionMode, SectionState};

    fn descriptor(id: SectionId) -> SectionDescriptor {
        SectionDescriptor {
            id,
            mode: id.default_mode(),
            required: true,
        }
    }

    async fn ready_store(id: SectionId) -> (InMemorySectionStore, Uuid) {
        let store = InMemorySectionStore::new();
        let document_id = Uuid::new_v4();
        store
            .init_sections(document_id, &[descriptor(id)])
            .await
            .unwrap();
        store
            .transition(document_id, id, Transition::unlock())
            .await
            .unwrap();
        (store, document_id)
    }

    #[tokio::test]
    async fn test_init_creates_locked_records_in_canonical_order() {
        let store = InMemorySectionStore::new();
        let document_id = Uuid::new_v4();
        let records = store
            .init_sections(
                document_id,
                &[descriptor(SectionId::CoverLetter), descriptor(SectionId::Contact)],
            )
            .await
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.section_id).collect();
        assert_eq!(ids, vec![SectionId::Contact, SectionId::CoverLetter]);
        assert!(records.iter().all(|r| r.state == SectionState::Locked));
    }

    #[tokio::test]
    async fn test_init_keeps_existing_records() {
        let (store, document_id) = ready_store(SectionId::Summary).await;

        let records = store
            .init_sections(document_id, &[descriptor(SectionId::Summary)])
            .await
            .unwrap();

        assert_eq!(records[0].state, SectionState::Ready);
    }

    #[tokio::test]
    async fn test_dispatch_of_locked_section_conflicts() {
        let store = InMemorySectionStore::new();
        let document_id = Uuid::new_v4();
        store
            .init_sections(document_id, &[descriptor(SectionId::Skills)])
            .await
            .unwrap();

        let err = store
            .transition(document_id, SectionId::Skills, Transition::dispatch(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Conflict {
                actual: SectionState::Locked,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected_before_cas() {
        let (store, document_id) = ready_store(SectionId::Summary).await;

        let err = store
            .transition(
                document_id,
                SectionId::Summary,
                Transition::reset(SectionState::Ready),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_stale_attempt_cannot_complete() {
        let (store, document_id) = ready_store(SectionId::Summary).await;
        let attempt = Uuid::new_v4();
        store
            .transition(document_id, SectionId::Summary, Transition::dispatch(attempt))
            .await
            .unwrap();

        let stale = store
            .transition(
                document_id,
                SectionId::Summary,
                Transition::complete(Uuid::new_v4(), Map::new()),
            )
            .await;
        assert!(matches!(stale, Err(StoreError::Conflict { .. })));

        let record = store
            .transition(
                document_id,
                SectionId::Summary,
                Transition::fail(attempt, SectionError::upstream("quota")),
            )
            .await
            .unwrap();
        assert_eq!(record.state, SectionState::Error);
        assert_eq!(record.last_error.unwrap().message, "quota");
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_admits_exactly_one() {
        let (store, document_id) = ready_store(SectionId::Experience).await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .transition(
                            document_id,
                            SectionId::Experience,
                            Transition::dispatch(Uuid::new_v4()),
                        )
                        .await
                })
            })
            .collect();

        let mut admitted = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => {
                    assert_eq!(record.state, SectionState::Generating);
                    admitted += 1;
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    assert_eq!(actual, SectionState::Generating);
                    conflicts += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_put_record_overwrites_without_cas() {
        let (store, document_id) = ready_store(SectionId::Awards).await;
        let mut record = store
            .get_section(document_id, SectionId::Awards)
            .await
            .unwrap();
        record.state = SectionState::Complete;
        record.mode = SectionMode::Manual;
        record.content = Some(Map::new());

        store.put_record(&record).await.unwrap();

        let stored = store
            .get_section(document_id, SectionId::Awards)
            .await
            .unwrap();
        assert_eq!(stored.state, SectionState::Complete);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemorySectionStore::new();
        store.set_unavailable(true);
        let result = store.list_sections(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
