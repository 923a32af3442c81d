use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::Result;
use crate::store::{SequenceKey, SequenceRow, SequenceStore, Version};

/// In-memory sequence store for testing.
#[derive(Clone, Default)]
pub struct InMemorySequenceStore {
    rows: Arc<RwLock<HashMap<SequenceKey, SequenceRow>>>,
    cas_attempts: Arc<AtomicUsize>,
}

impl InMemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored row for a key, if any.
    pub async fn row(&self, key: &SequenceKey) -> Option<SequenceRow> {
        self.rows.read().await.get(key).cloned()
    }

    /// Number of compare-and-swap calls seen so far, successful or not.
    pub fn cas_attempts(&self) -> usize {
        self.cas_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SequenceStore for InMemorySequenceStore {
    async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceRow>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn compare_and_swap(
        &self,
        key: &SequenceKey,
        expected: Version,
        new_number: i64,
        new_version: Version,
    ) -> Result<bool> {
        self.cas_attempts.fetch_add(1, Ordering::SeqCst);

        let mut rows = self.rows.write().await;
        match rows.get_mut(key) {
            Some(row) if row.version == expected => {
                row.current_number = new_number;
                row.version = new_version;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn provision(&self, key: &SequenceKey, start: i64) -> Result<bool> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(key) {
            return Ok(false);
        }
        rows.insert(
            key.clone(),
            SequenceRow {
                current_number: start,
                version: Version::initial(),
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }
}
