//! Optimistic compare-and-swap numbering.
//!
//! Each call reads the row, computes `current_number + 1`, and writes it back
//! only if the row version is unchanged. A lost race backs off linearly and
//! starts over from a fresh read.

use std::time::Duration;

use common::TenantId;

use crate::store::{DocumentType, SequenceKey, SequenceStore};
use crate::{Result, SequenceError};

/// Default number of compare-and-swap attempts per call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff step; attempt `n` waits `n * step` before retrying.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(10);

/// Retry behavior for contended sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    /// Delay after losing the given (1-based) attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Hands out gap-free, strictly increasing numbers per (tenant, document type).
pub struct SequenceGenerator<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: SequenceStore> SequenceGenerator<S> {
    /// Creates a generator with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    pub fn with_policy(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the next number for the sequence.
    ///
    /// Fails with [`SequenceError::NotFound`] without retrying when the row
    /// was never provisioned, and with [`SequenceError::Contention`] once
    /// every attempt has lost its compare-and-swap.
    #[tracing::instrument(skip(self), fields(tenant_id = %tenant_id, document_type = %document_type))]
    pub async fn next_number(
        &self,
        tenant_id: &TenantId,
        document_type: &DocumentType,
    ) -> Result<i64> {
        let key = SequenceKey::new(tenant_id.clone(), document_type.clone());
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if let Some(number) = self.try_advance(&key).await? {
                metrics::counter!("sequence_numbers_issued_total").increment(1);
                tracing::debug!(number, attempt, "sequence number issued");
                return Ok(number);
            }

            metrics::counter!("sequence_cas_conflicts_total").increment(1);
            tracing::debug!(attempt, "sequence version changed, retrying");

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        metrics::counter!("sequence_contention_exhausted_total").increment(1);
        tracing::warn!(attempts = max_attempts, "sequence contention not resolved");

        Err(SequenceError::Contention {
            key,
            attempts: max_attempts,
        })
    }

    /// One read-increment-swap round. `None` means another writer won.
    async fn try_advance(&self, key: &SequenceKey) -> Result<Option<i64>> {
        let row = self
            .store
            .read(key)
            .await?
            .ok_or_else(|| SequenceError::NotFound(key.clone()))?;

        let exhausted = || SequenceError::Exhausted(key.clone());
        let next = row.current_number.checked_add(1).ok_or_else(exhausted)?;
        let next_version = row.version.next().ok_or_else(exhausted)?;

        let swapped = self
            .store
            .compare_and_swap(key, row.version, next, next_version)
            .await?;

        Ok(swapped.then_some(next))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures_util::future::join_all;

    use super::*;
    use crate::memory::InMemorySequenceStore;
    use crate::store::{SequenceRow, Version};

    fn tenant() -> TenantId {
        TenantId::new("tenant-a").unwrap()
    }

    fn invoice() -> DocumentType {
        DocumentType::new("INVOICE").unwrap()
    }

    async fn provisioned(start: i64) -> InMemorySequenceStore {
        let store = InMemorySequenceStore::new();
        store
            .provision(&SequenceKey::new(tenant(), invoice()), start)
            .await
            .unwrap();
        store
    }

    /// Lets a concurrent writer bump the version before the first `losses`
    /// swaps, or before every swap when `losses` is `usize::MAX`.
    struct RacingStore {
        inner: InMemorySequenceStore,
        losses: usize,
        swaps: AtomicUsize,
    }

    impl RacingStore {
        fn new(inner: InMemorySequenceStore, losses: usize) -> Self {
            Self {
                inner,
                losses,
                swaps: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SequenceStore for RacingStore {
        async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceRow>> {
            self.inner.read(key).await
        }

        async fn compare_and_swap(
            &self,
            key: &SequenceKey,
            expected: Version,
            new_number: i64,
            new_version: Version,
        ) -> Result<bool> {
            let seen = self.swaps.fetch_add(1, Ordering::SeqCst);
            if seen < self.losses {
                let row = self.inner.read(key).await?.unwrap();
                self.inner
                    .compare_and_swap(
                        key,
                        row.version,
                        row.current_number,
                        row.version.next().unwrap(),
                    )
                    .await?;
            }
            self.inner
                .compare_and_swap(key, expected, new_number, new_version)
                .await
        }

        async fn provision(&self, key: &SequenceKey, start: i64) -> Result<bool> {
            self.inner.provision(key, start).await
        }
    }

    /// Yields between read and swap so concurrent callers interleave.
    struct YieldingStore(InMemorySequenceStore);

    #[async_trait]
    impl SequenceStore for YieldingStore {
        async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceRow>> {
            let row = self.0.read(key).await;
            tokio::task::yield_now().await;
            row
        }

        async fn compare_and_swap(
            &self,
            key: &SequenceKey,
            expected: Version,
            new_number: i64,
            new_version: Version,
        ) -> Result<bool> {
            self.0
                .compare_and_swap(key, expected, new_number, new_version)
                .await
        }

        async fn provision(&self, key: &SequenceKey, start: i64) -> Result<bool> {
            self.0.provision(key, start).await
        }
    }

    #[tokio::test]
    async fn numbers_increase_from_provisioned_start() {
        let generator = SequenceGenerator::new(provisioned(0).await);

        assert_eq!(generator.next_number(&tenant(), &invoice()).await.unwrap(), 1);
        assert_eq!(generator.next_number(&tenant(), &invoice()).await.unwrap(), 2);
        assert_eq!(generator.next_number(&tenant(), &invoice()).await.unwrap(), 3);

        let row = generator
            .store()
            .row(&SequenceKey::new(tenant(), invoice()))
            .await
            .unwrap();
        assert_eq!(row.current_number, 3);
        assert_eq!(row.version, Version::new(3));
    }

    #[tokio::test]
    async fn starts_after_seeded_value() {
        let generator = SequenceGenerator::new(provisioned(1000).await);
        assert_eq!(
            generator.next_number(&tenant(), &invoice()).await.unwrap(),
            1001
        );
    }

    #[tokio::test]
    async fn missing_row_is_not_found_without_retry() {
        let store = InMemorySequenceStore::new();
        let generator = SequenceGenerator::new(store.clone());

        let result = generator.next_number(&tenant(), &invoice()).await;
        assert!(matches!(result, Err(SequenceError::NotFound(_))));
        assert_eq!(store.cas_attempts(), 0);
    }

    #[tokio::test]
    async fn saturated_version_is_exhausted() {
        let store = provisioned(5).await;
        let key = SequenceKey::new(tenant(), invoice());
        store
            .compare_and_swap(&key, Version::initial(), 5, Version::new(i64::MAX))
            .await
            .unwrap();
        let generator = SequenceGenerator::new(store.clone());

        let result = generator.next_number(&tenant(), &invoice()).await;
        assert!(matches!(result, Err(SequenceError::Exhausted(_))));
        assert_eq!(store.row(&key).await.unwrap().current_number, 5);
        assert_eq!(store.cas_attempts(), 1);
    }

    #[tokio::test]
    async fn sequences_are_independent_per_tenant_and_type() {
        let store = provisioned(0).await;
        let other_tenant = TenantId::new("tenant-b").unwrap();
        let order = DocumentType::new("ORDER").unwrap();
        store
            .provision(&SequenceKey::new(other_tenant.clone(), invoice()), 0)
            .await
            .unwrap();
        store
            .provision(&SequenceKey::new(tenant(), order.clone()), 0)
            .await
            .unwrap();
        let generator = SequenceGenerator::new(store);

        assert_eq!(generator.next_number(&tenant(), &invoice()).await.unwrap(), 1);
        assert_eq!(generator.next_number(&tenant(), &invoice()).await.unwrap(), 2);
        assert_eq!(
            generator.next_number(&other_tenant, &invoice()).await.unwrap(),
            1
        );
        assert_eq!(generator.next_number(&tenant(), &order).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_swaps_are_retried_with_fresh_read() {
        let store = RacingStore::new(provisioned(0).await, 3);
        let generator = SequenceGenerator::new(store);

        let number = generator.next_number(&tenant(), &invoice()).await.unwrap();

        // The racing writer only bumps the version, so the number is unaffected.
        assert_eq!(number, 1);
        assert_eq!(generator.store().swaps.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn contention_after_max_attempts() {
        let store = RacingStore::new(provisioned(0).await, usize::MAX);
        let generator = SequenceGenerator::new(store);

        let started = tokio::time::Instant::now();
        let result = generator.next_number(&tenant(), &invoice()).await;

        match result {
            Err(SequenceError::Contention { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected contention, got {other:?}"),
        }
        assert_eq!(generator.store().swaps.load(Ordering::SeqCst), 5);
        // 10 + 20 + 30 + 40 ms, no sleep after the final attempt.
        assert!(started.elapsed() >= Duration::from_millis(100));

        let row = generator
            .store()
            .inner
            .row(&SequenceKey::new(tenant(), invoice()))
            .await
            .unwrap();
        assert_eq!(row.current_number, 0);
    }

    #[tokio::test]
    async fn concurrent_callers_get_dense_unique_numbers() {
        let generator = Arc::new(SequenceGenerator::new(provisioned(0).await));

        let calls = (0..100).map(|_| {
            let generator = Arc::clone(&generator);
            async move { generator.next_number(&tenant(), &invoice()).await }
        });
        let numbers: HashSet<i64> = join_all(calls)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(numbers, (1..=100).collect::<HashSet<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interleaved_callers_on_worker_threads_never_duplicate() {
        const CALLERS: u32 = 32;

        // A caller can only lose to another caller's successful swap, so
        // CALLERS attempts always suffice.
        let policy = RetryPolicy {
            max_attempts: CALLERS,
            backoff_step: Duration::ZERO,
        };
        let generator = Arc::new(SequenceGenerator::with_policy(
            YieldingStore(provisioned(0).await),
            policy,
        ));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let generator = Arc::clone(&generator);
                tokio::spawn(async move { generator.next_number(&tenant(), &invoice()).await })
            })
            .collect();

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap().unwrap());
        }
        numbers.sort_unstable();

        assert_eq!(numbers, (1..=i64::from(CALLERS)).collect::<Vec<_>>());
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(4), Duration::from_millis(40));
    }
}
