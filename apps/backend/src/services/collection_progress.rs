//! Per-user, per-collection status counters.
//!
//! The counters are a cache over the user's card statuses. They are never
//! recomputed; every card transition hands its delta to [`apply_delta_in`]
//! inside the same transaction as the card write.
//!
//! [`apply_delta_in`]: CollectionProgressAggregator::apply_delta_in

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{self, AggregateStore, OptionalRecord, StoreResult, StoreTransaction};
use crate::models::{CollectionKey, CollectionProgress, ProgressDelta};

#[derive(Clone)]
pub struct CollectionProgressAggregator {
    store: Arc<dyn AggregateStore>,
}

impl CollectionProgressAggregator {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    /// Current counters, or `None` when the user never touched the collection.
    pub async fn get(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<CollectionProgress>> {
        let key = CollectionKey::new(user_id, collection_id);
        let mut tx = self.store.begin().await?;
        let progress = tx.lock_collection_progress(key).await.optional()?;
        tx.commit().await?;
        Ok(progress)
    }

    /// Create the all-zero row unless it exists; returns the stored counters.
    pub async fn create_if_absent(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<CollectionProgress> {
        let key = CollectionKey::new(user_id, collection_id);
        let mut tx = self.store.begin().await?;
        let progress = Self::ensure_in(tx.as_mut(), key).await?;
        tx.commit().await?;
        Ok(progress)
    }

    /// Apply a delta in its own transaction, creating the row first if needed.
    pub async fn apply_delta(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
        delta: ProgressDelta,
    ) -> StoreResult<CollectionProgress> {
        let key = CollectionKey::new(user_id, collection_id);
        let mut tx = self.store.begin().await?;
        let current = Self::ensure_in(tx.as_mut(), key).await?;
        let progress = Self::apply_delta_in(tx.as_mut(), key, current, delta).await?;
        tx.commit().await?;
        Ok(progress)
    }

    /// Lock the counters inside `tx`, creating the all-zero row if absent.
    pub async fn ensure_in(
        tx: &mut dyn StoreTransaction,
        key: CollectionKey,
    ) -> StoreResult<CollectionProgress> {
        let (progress, _) = db::get_or_create(tx, key, CollectionProgress::default).await?;
        Ok(progress)
    }

    /// Write `current + delta` (clamped at zero) inside `tx`.
    ///
    /// `current` must come from [`Self::ensure_in`] on the same transaction so
    /// the row is already locked.
    pub async fn apply_delta_in(
        tx: &mut dyn StoreTransaction,
        key: CollectionKey,
        current: CollectionProgress,
        delta: ProgressDelta,
    ) -> StoreResult<CollectionProgress> {
        if delta.is_zero() {
            return Ok(current);
        }

        if clamps(current, delta) {
            tracing::warn!(%key, ?current, ?delta, "collection counter clamped at zero");
        }
        let next = current.apply(delta);
        tx.update_collection_progress(key, &next).await?;
        Ok(next)
    }
}

/// Whether applying `delta` would take any counter below zero.
fn clamps(current: CollectionProgress, delta: ProgressDelta) -> bool {
    [
        (current.mastered, delta.mastered),
        (current.reviewing, delta.reviewing),
        (current.learning, delta.learning),
    ]
    .into_iter()
    .any(|(count, step)| i64::from(count) + i64::from(step) < 0)
}
