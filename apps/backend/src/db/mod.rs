//! Aggregate store: transactional access to progress and interaction records.
//!
//! Every engine operation runs inside one [`StoreTransaction`]. `lock_*` reads
//! take an exclusive lock on the row that is held until the transaction ends,
//! so concurrent writers to the same key serialize. Dropping a transaction
//! without calling [`StoreTransaction::commit`] rolls back everything it wrote.

pub mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    CardKey, CardProgress, CollectionCounters, CollectionKey, CollectionProgress,
    UserInteraction,
};

pub use error::{OptionalRecord, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Source of transactions.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Start an atomic unit.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// One atomic unit over the four record kinds.
///
/// `insert_*` only writes when the row is absent and reports whether it did.
/// `update_*` fails with [`StoreError::NotFound`] when the row is absent.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn lock_card_progress(&mut self, key: CardKey) -> StoreResult<CardProgress>;
    async fn insert_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<bool>;
    async fn update_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<()>;

    async fn lock_collection_progress(
        &mut self,
        key: CollectionKey,
    ) -> StoreResult<CollectionProgress>;
    async fn insert_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<bool>;
    async fn update_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<()>;

    async fn lock_user_metrics(&mut self, key: CollectionKey) -> StoreResult<UserInteraction>;
    async fn insert_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<bool>;
    async fn update_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<()>;

    async fn lock_collection_metrics(
        &mut self,
        collection_id: Uuid,
    ) -> StoreResult<CollectionCounters>;
    async fn insert_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<bool>;
    async fn update_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<()>;

    /// Publish every write made in this unit.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// A record kind that can be locked and lazily created inside a transaction.
#[async_trait]
pub trait Aggregate: Sized + Send + Sync + 'static {
    type Key: Copy + Send + Sync + std::fmt::Display + 'static;

    async fn lock(tx: &mut dyn StoreTransaction, key: Self::Key) -> StoreResult<Self>;
    async fn insert(tx: &mut dyn StoreTransaction, key: Self::Key, record: &Self)
        -> StoreResult<bool>;
}

#[async_trait]
impl Aggregate for CardProgress {
    type Key = CardKey;

    async fn lock(tx: &mut dyn StoreTransaction, key: CardKey) -> StoreResult<Self> {
        tx.lock_card_progress(key).await
    }

    async fn insert(tx: &mut dyn StoreTransaction, key: CardKey, record: &Self) -> StoreResult<bool> {
        tx.insert_card_progress(key, record).await
    }
}

#[async_trait]
impl Aggregate for CollectionProgress {
    type Key = CollectionKey;

    async fn lock(tx: &mut dyn StoreTransaction, key: CollectionKey) -> StoreResult<Self> {
        tx.lock_collection_progress(key).await
    }

    async fn insert(
        tx: &mut dyn StoreTransaction,
        key: CollectionKey,
        record: &Self,
    ) -> StoreResult<bool> {
        tx.insert_collection_progress(key, record).await
    }
}

#[async_trait]
impl Aggregate for UserInteraction {
    type Key = CollectionKey;

    async fn lock(tx: &mut dyn StoreTransaction, key: CollectionKey) -> StoreResult<Self> {
        tx.lock_user_metrics(key).await
    }

    async fn insert(
        tx: &mut dyn StoreTransaction,
        key: CollectionKey,
        record: &Self,
    ) -> StoreResult<bool> {
        tx.insert_user_metrics(key, record).await
    }
}

#[async_trait]
impl Aggregate for CollectionCounters {
    type Key = Uuid;

    async fn lock(tx: &mut dyn StoreTransaction, key: Uuid) -> StoreResult<Self> {
        tx.lock_collection_metrics(key).await
    }

    async fn insert(tx: &mut dyn StoreTransaction, key: Uuid, record: &Self) -> StoreResult<bool> {
        tx.insert_collection_metrics(key, record).await
    }
}

/// Lock the record for `key`, creating it from `default` when it does not exist.
///
/// Returns the locked record and whether this transaction created it. When a
/// concurrent transaction creates the row first, this one waits for it and
/// returns the committed row with `false`.
pub async fn get_or_create<A, F>(
    tx: &mut dyn StoreTransaction,
    key: A::Key,
    default: F,
) -> StoreResult<(A, bool)>
where
    A: Aggregate,
    F: FnOnce() -> A + Send,
{
    match A::lock(&mut *tx, key).await {
        Ok(record) => Ok((record, false)),
        Err(err) if err.is_not_found() => {
            let record = default();
            let created = A::insert(&mut *tx, key, &record).await?;
            if created {
                tracing::debug!(%key, "created aggregate record");
            }
            let record = A::lock(&mut *tx, key).await?;
            Ok((record, created))
        }
        Err(err) => Err(err),
    }
}
