//! In-process aggregate store.
//!
//! Each key owns an async mutex cell. A transaction locks the cells it touches,
//! stages its writes next to the guards and copies them into the cells only on
//! commit, so dropping the transaction discards them. Keys that are never
//! touched together never contend. A cell that ends a transaction empty and
//! unclaimed is removed, so lookups of missing rows leave nothing behind.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::{AggregateStore, StoreTransaction};
use crate::models::{
    CardKey, CardProgress, CollectionCounters, CollectionKey, CollectionProgress,
    UserInteraction,
};

type Cell<V> = Arc<AsyncMutex<Option<V>>>;

/// All cells of one record kind.
struct Table<K, V> {
    kind: &'static str,
    cells: Mutex<HashMap<K, Cell<V>>>,
}

impl<K: Eq + Hash + Copy, V> Table<K, V> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: K) -> Cell<V> {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        cells
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// Drop the cell for `key` if it holds no row and nobody else references it.
    fn prune(&self, key: K) {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters clone the cell under this lock, so a count of one means none exist.
        let unused = cells.get(&key).is_some_and(|cell| {
            Arc::strong_count(cell) == 1 && cell.try_lock().is_ok_and(|value| value.is_none())
        });
        if unused {
            cells.remove(&key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct Tables {
    card_progress: Table<CardKey, CardProgress>,
    collection_progress: Table<CollectionKey, CollectionProgress>,
    user_metrics: Table<CollectionKey, UserInteraction>,
    collection_metrics: Table<Uuid, CollectionCounters>,
}

/// In-memory store used when no database is configured, and by tests.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Tables>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(Tables {
                card_progress: Table::new("card progress"),
                collection_progress: Table::new("collection progress"),
                user_metrics: Table::new("collection user metrics"),
                collection_metrics: Table::new("collection metrics"),
            }),
            lock_timeout,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            tables: self.tables.clone(),
            lock_timeout: self.lock_timeout,
            card_progress: Ledger::default(),
            collection_progress: Ledger::default(),
            user_metrics: Ledger::default(),
            collection_metrics: Ledger::default(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// A locked cell and the value this transaction will publish into it.
struct Held<V> {
    guard: OwnedMutexGuard<Option<V>>,
    staged: Option<V>,
}

/// The cells of one kind held by a transaction.
struct Ledger<K, V> {
    held: HashMap<K, Held<V>>,
}

impl<K, V> Default for Ledger<K, V> {
    fn default() -> Self {
        Self {
            held: HashMap::new(),
        }
    }
}

impl<K, V> Ledger<K, V>
where
    K: Eq + Hash + Copy + Display + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn acquire(
        &mut self,
        table: &Table<K, V>,
        key: K,
        timeout: Duration,
    ) -> StoreResult<&mut Held<V>> {
        match self.held.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let cell = table.cell(key);
                let guard = tokio::time::timeout(timeout, cell.lock_owned())
                    .await
                    .map_err(|_| StoreError::LockTimeout(format!("{} {}", table.kind, key)))?;
                let staged = (*guard).clone();
                Ok(entry.insert(Held { guard, staged }))
            }
        }
    }

    async fn lock(&mut self, table: &Table<K, V>, key: K, timeout: Duration) -> StoreResult<V> {
        let held = self.acquire(table, key, timeout).await?;
        held.staged
            .clone()
            .ok_or_else(|| StoreError::not_found(table.kind, key))
    }

    async fn insert(
        &mut self,
        table: &Table<K, V>,
        key: K,
        value: &V,
        timeout: Duration,
    ) -> StoreResult<bool> {
        let held = self.acquire(table, key, timeout).await?;
        if held.staged.is_some() {
            return Ok(false);
        }
        held.staged = Some(value.clone());
        Ok(true)
    }

    async fn update(
        &mut self,
        table: &Table<K, V>,
        key: K,
        value: &V,
        timeout: Duration,
    ) -> StoreResult<()> {
        let held = self.acquire(table, key, timeout).await?;
        match held.staged.as_mut() {
            Some(current) => {
                *current = value.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(table.kind, key)),
        }
    }

    fn publish(&mut self) {
        for held in self.held.values_mut() {
            *held.guard = held.staged.take();
        }
    }

    /// Unlock every held cell, pruning the ones left empty.
    fn release(&mut self, table: &Table<K, V>) {
        for (key, held) in self.held.drain() {
            let empty = held.guard.is_none();
            drop(held);
            if empty {
                table.prune(key);
            }
        }
    }
}

pub struct MemoryTransaction {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    card_progress: Ledger<CardKey, CardProgress>,
    collection_progress: Ledger<CollectionKey, CollectionProgress>,
    user_metrics: Ledger<CollectionKey, UserInteraction>,
    collection_metrics: Ledger<Uuid, CollectionCounters>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_card_progress(&mut self, key: CardKey) -> StoreResult<CardProgress> {
        self.card_progress
            .lock(&self.tables.card_progress, key, self.lock_timeout)
            .await
    }

    async fn insert_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<bool> {
        self.card_progress
            .insert(&self.tables.card_progress, key, progress, self.lock_timeout)
            .await
    }

    async fn update_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<()> {
        self.card_progress
            .update(&self.tables.card_progress, key, progress, self.lock_timeout)
            .await
    }

    async fn lock_collection_progress(
        &mut self,
        key: CollectionKey,
    ) -> StoreResult<CollectionProgress> {
        self.collection_progress
            .lock(&self.tables.collection_progress, key, self.lock_timeout)
            .await
    }

    async fn insert_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<bool> {
        self.collection_progress
            .insert(&self.tables.collection_progress, key, progress, self.lock_timeout)
            .await
    }

    async fn update_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<()> {
        self.collection_progress
            .update(&self.tables.collection_progress, key, progress, self.lock_timeout)
            .await
    }

    async fn lock_user_metrics(&mut self, key: CollectionKey) -> StoreResult<UserInteraction> {
        self.user_metrics
            .lock(&self.tables.user_metrics, key, self.lock_timeout)
            .await
    }

    async fn insert_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<bool> {
        self.user_metrics
            .insert(&self.tables.user_metrics, key, metrics, self.lock_timeout)
            .await
    }

    async fn update_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<()> {
        self.user_metrics
            .update(&self.tables.user_metrics, key, metrics, self.lock_timeout)
            .await
    }

    async fn lock_collection_metrics(
        &mut self,
        collection_id: Uuid,
    ) -> StoreResult<CollectionCounters> {
        self.collection_metrics
            .lock(&self.tables.collection_metrics, collection_id, self.lock_timeout)
            .await
    }

    async fn insert_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<bool> {
        self.collection_metrics
            .insert(
                &self.tables.collection_metrics,
                collection_id,
                counters,
                self.lock_timeout,
            )
            .await
    }

    async fn update_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<()> {
        self.collection_metrics
            .update(
                &self.tables.collection_metrics,
                collection_id,
                counters,
                self.lock_timeout,
            )
            .await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut this = *self;
        this.card_progress.publish();
        this.collection_progress.publish();
        this.user_metrics.publish();
        this.collection_metrics.publish();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let tables = &self.tables;
        self.card_progress.release(&tables.card_progress);
        self.collection_progress.release(&tables.collection_progress);
        self.user_metrics.release(&tables.user_metrics);
        self.collection_metrics.release(&tables.collection_metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Level;

    fn key() -> CollectionKey {
        CollectionKey::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryStore::default();
        let key = key();

        let mut tx = store.begin().await.unwrap();
        assert!(tx
            .insert_collection_progress(key, &CollectionProgress::default())
            .await
            .unwrap());
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        let err = tx.lock_collection_progress(key).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::default();
        let card = CardKey::new(Uuid::new_v4(), Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        tx.insert_card_progress(card, &CardProgress::at(Level::ZERO))
            .await
            .unwrap();
        tx.update_card_progress(card, &CardProgress::at(Level::ONE))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let progress = tx.lock_card_progress(card).await.unwrap();
        assert_eq!(progress.level(), Level::ONE);
    }

    #[tokio::test]
    async fn insert_keeps_existing_row() {
        let store = MemoryStore::default();
        let collection_id = Uuid::new_v4();
        let counters = CollectionCounters {
            likes: 3,
            dislikes: 0,
            views: 5,
        };

        let mut tx = store.begin().await.unwrap();
        tx.insert_collection_metrics(collection_id, &counters)
            .await
            .unwrap();
        let inserted = tx
            .insert_collection_metrics(collection_id, &CollectionCounters::default())
            .await
            .unwrap();
        assert!(!inserted);
        assert_eq!(
            tx.lock_collection_metrics(collection_id).await.unwrap(),
            counters
        );
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let store = MemoryStore::default();
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .update_user_metrics(key(), &UserInteraction::first_touch())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn second_transaction_waits_for_lock() {
        let store = MemoryStore::new(Duration::from_millis(50));
        let key = key();

        let mut first = store.begin().await.unwrap();
        first
            .insert_user_metrics(key, &UserInteraction::first_touch())
            .await
            .unwrap();

        let mut second = store.begin().await.unwrap();
        let err = second.lock_user_metrics(key).await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(_)));

        first.commit().await.unwrap();
        let mut third = store.begin().await.unwrap();
        assert!(third.lock_user_metrics(key).await.unwrap().viewed);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let store = MemoryStore::new(Duration::from_millis(50));

        let mut first = store.begin().await.unwrap();
        first
            .insert_collection_progress(key(), &CollectionProgress::default())
            .await
            .unwrap();

        let mut second = store.begin().await.unwrap();
        assert!(second
            .insert_collection_progress(key(), &CollectionProgress::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn missed_lookups_leave_no_cells() {
        let store = MemoryStore::default();

        for _ in 0..1000 {
            let mut tx = store.begin().await.unwrap();
            assert!(tx
                .lock_collection_progress(key())
                .await
                .unwrap_err()
                .is_not_found());
            tx.commit().await.unwrap();
        }
        for _ in 0..10 {
            let mut tx = store.begin().await.unwrap();
            let _ = tx.lock_collection_metrics(Uuid::new_v4()).await;
        }

        assert_eq!(store.tables.collection_progress.len(), 0);
        assert_eq!(store.tables.collection_metrics.len(), 0);
    }

    #[tokio::test]
    async fn rolled_back_insert_leaves_no_cell() {
        let store = MemoryStore::default();
        let card = CardKey::new(Uuid::new_v4(), Uuid::new_v4());

        let mut tx = store.begin().await.unwrap();
        tx.insert_card_progress(card, &CardProgress::at(Level::ONE))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(store.tables.card_progress.len(), 0);
    }

    #[tokio::test]
    async fn stored_rows_keep_their_cells() {
        let store = MemoryStore::default();
        let key = key();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user_metrics(key, &UserInteraction::first_touch())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.tables.user_metrics.len(), 1);
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_user_metrics(key).await.unwrap().viewed);
    }
}
