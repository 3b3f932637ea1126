//! Content Aggregator: folds section records into one snapshot and decides whether the
//! document is complete. Pure apart from the store read in `Aggregator::snapshot`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::sections::error::StoreError;
use crate::sections::models::{SectionContent, SectionError, SectionId, SectionRecord, SectionState};
use crate::sections::store::SectionStore;

/// A required section that is not `complete`. `state` is `None` when no record exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutstandingSection {
    pub section_id: SectionId,
    pub state: Option<SectionState>,
    pub last_error: Option<SectionError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedContent {
    pub document_id: Uuid,
    /// Content of every complete section, required or not.
    pub sections: BTreeMap<SectionId, SectionContent>,
    pub states: BTreeMap<SectionId, SectionState>,
    pub is_complete: bool,
    pub outstanding: Vec<OutstandingSection>,
}

impl AggregatedContent {
    pub fn content(&self, section_id: SectionId) -> Option<&SectionContent> {
        self.sections.get(&section_id)
    }
}

/// Complete iff every required section has a `complete` record. An empty required set
/// means the document was never cataloged, which is not complete.
pub fn aggregate(
    document_id: Uuid,
    required: &[SectionId],
    records: &[SectionRecord],
) -> AggregatedContent {
    let by_id: HashMap<SectionId, &SectionRecord> =
        records.iter().map(|r| (r.section_id, r)).collect();

    let mut outstanding: Vec<OutstandingSection> = required
        .iter()
        .filter_map(|id| match by_id.get(id) {
            Some(record) if record.state == SectionState::Complete => None,
            Some(record) => Some(OutstandingSection {
                section_id: *id,
                state: Some(record.state),
                last_error: record.last_error.clone(),
            }),
            None => Some(OutstandingSection {
                section_id: *id,
                state: None,
                last_error: None,
            }),
        })
        .collect();
    outstanding.sort_by_key(|o| o.section_id);
    outstanding.dedup_by_key(|o| o.section_id);

    let sections = records
        .iter()
        .filter(|r| r.state == SectionState::Complete)
        .filter_map(|r| r.content.clone().map(|c| (r.section_id, c)))
        .collect();
    let states = records.iter().map(|r| (r.section_id, r.state)).collect();

    AggregatedContent {
        document_id,
        sections,
        states,
        is_complete: !required.is_empty() && outstanding.is_empty(),
        outstanding,
    }
}

#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn SectionStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn SectionStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self, document_id: Uuid) -> Result<AggregatedContent, StoreError> {
        let document = self.store.get_document(document_id).await?;
        let records = self.store.list_sections(document_id).await?;
        Ok(aggregate(document_id, &document.required_sections, &records))
    }
}
