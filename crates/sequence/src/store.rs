use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TenantId;
use serde::{Deserialize, Serialize};

use crate::{Result, SequenceError};

/// Optimistic-concurrency token of a sequence row.
///
/// Incremented on every successful update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly provisioned row.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version, or `None` once the counter is at `i64::MAX`.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of document being numbered, e.g. `INVOICE` or `ORDER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentType(String);

impl DocumentType {
    /// Creates a document type, rejecting empty or blank values.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(SequenceError::DocumentTypeRequired);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite key of a sequence row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceKey {
    pub tenant_id: TenantId,
    pub document_type: DocumentType,
}

impl SequenceKey {
    pub fn new(tenant_id: TenantId, document_type: DocumentType) -> Self {
        Self {
            tenant_id,
            document_type,
        }
    }
}

impl std::fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tenant {}, document_type {}",
            self.tenant_id, self.document_type
        )
    }
}

/// Stored state of a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRow {
    /// Last number handed out; 0 before the first one.
    pub current_number: i64,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

/// Storage contract for sequence rows.
///
/// Implementations must make [`compare_and_swap`](SequenceStore::compare_and_swap)
/// atomic with respect to concurrent callers on the same key.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Reads the current row, or `None` if it was never provisioned.
    async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceRow>>;

    /// Writes `new_number`/`new_version` only if the stored version still
    /// equals `expected`. Returns false when no row matched.
    async fn compare_and_swap(
        &self,
        key: &SequenceKey,
        expected: Version,
        new_number: i64,
        new_version: Version,
    ) -> Result<bool>;

    /// Inserts a row starting at `start` unless one already exists.
    /// Returns true if a row was created.
    async fn provision(&self, key: &SequenceKey, start: i64) -> Result<bool>;
}

#[async_trait]
impl<T: SequenceStore + ?Sized> SequenceStore for Arc<T> {
    async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceRow>> {
        (**self).read(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &SequenceKey,
        expected: Version,
        new_number: i64,
        new_version: Version,
    ) -> Result<bool> {
        (**self)
            .compare_and_swap(key, expected, new_number, new_version)
            .await
    }

    async fn provision(&self, key: &SequenceKey, start: i64) -> Result<bool> {
        (**self).provision(key, start).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_requires_content() {
        assert!(matches!(
            DocumentType::new(" "),
            Err(SequenceError::DocumentTypeRequired)
        ));
        assert_eq!(DocumentType::new("INVOICE").unwrap().as_str(), "INVOICE");
    }

    #[test]
    fn version_next_increments() {
        assert_eq!(Version::initial().next(), Some(Version::new(1)));
        assert_eq!(Version::new(41).next().map(|v| v.as_i64()), Some(42));
        assert_eq!(Version::new(i64::MAX).next(), None);
    }

    #[test]
    fn key_display_names_both_parts() {
        let key = SequenceKey::new(
            TenantId::new("acme").unwrap(),
            DocumentType::new("INVOICE").unwrap(),
        );
        assert_eq!(key.to_string(), "tenant acme, document_type INVOICE");
    }
}
