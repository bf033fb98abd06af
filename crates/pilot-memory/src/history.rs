use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use pilot_core::{PersistedMessage, Result, SubjectId};

/// Append-only chat history, keyed by user.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All stored records for `subject_id`, oldest first.
    async fn fetch(&self, subject_id: SubjectId) -> Result<Vec<PersistedMessage>>;

    /// Append records after any existing ones, preserving their order.
    async fn append(&self, subject_id: SubjectId, records: &[PersistedMessage]) -> Result<()>;
}

/// Process-local store; contents are lost on exit.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    log: RwLock<HashMap<SubjectId, Vec<PersistedMessage>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn fetch(&self, subject_id: SubjectId) -> Result<Vec<PersistedMessage>> {
        Ok(self
            .log
            .read()
            .get(&subject_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, subject_id: SubjectId, records: &[PersistedMessage]) -> Result<()> {
        self.log
            .write()
            .entry(subject_id)
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }
}
