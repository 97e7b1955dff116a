//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext wiring the engines and router over one store
//! - Bearer token helpers
//! - A store wrapper that fails chosen writes, for rollback tests
//!
//! Most tests run against the in-memory store. Tests marked
//! `#[ignore = "requires database"]` need DATABASE_URL.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use uuid::Uuid;

use vocab_backend::db::{
    AggregateStore, MemoryStore, PgStore, StoreError, StoreResult, StoreTransaction,
};
use vocab_backend::models::*;
use vocab_backend::{build_router, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Test context containing the shared store, engines and router.
pub struct TestContext {
    pub store: Arc<dyn AggregateStore>,
    pub state: AppState,
    app: Router,
}

impl TestContext {
    /// Context over a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new(Duration::from_secs(5))))
    }

    /// Context over PostgreSQL.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn postgres() -> (Self, PgStore) {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let store = PgStore::connect(
            &database_url,
            10,
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .await
        .expect("Failed to connect to test database");

        store
            .run_migrations()
            .await
            .expect("Failed to run migrations");

        (Self::with_store(Arc::new(store.clone())), store)
    }

    pub fn with_store(store: Arc<dyn AggregateStore>) -> Self {
        let state = AppState::new(store.clone(), TEST_SECRET);
        let app = build_router(state.clone());
        Self { store, state, app }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Format authorization header value.
    pub fn auth_header_value(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /// Authorization header value for a user.
    pub fn auth_for(user_id: Uuid) -> String {
        Self::auth_header_value(&fixtures::token_for(user_id, TEST_SECRET))
    }
}

/// Store wrapper whose transactions fail chosen writes.
pub struct FailingStore {
    inner: MemoryStore,
    fail_collection_progress_update: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_collection_progress_update: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every later collection progress update fail.
    pub fn fail_collection_progress_updates(&self, fail: bool) {
        self.fail_collection_progress_update
            .store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AggregateStore for FailingStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            fail_collection_progress_update: self.fail_collection_progress_update.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct FailingTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_collection_progress_update: Arc<AtomicBool>,
}

#[async_trait]
impl StoreTransaction for FailingTransaction {
    async fn lock_card_progress(&mut self, key: CardKey) -> StoreResult<CardProgress> {
        self.inner.lock_card_progress(key).await
    }

    async fn insert_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<bool> {
        self.inner.insert_card_progress(key, progress).await
    }

    async fn update_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<()> {
        self.inner.update_card_progress(key, progress).await
    }

    async fn lock_collection_progress(
        &mut self,
        key: CollectionKey,
    ) -> StoreResult<CollectionProgress> {
        self.inner.lock_collection_progress(key).await
    }

    async fn insert_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<bool> {
        self.inner.insert_collection_progress(key, progress).await
    }

    async fn update_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<()> {
        if self.fail_collection_progress_update.load(Ordering::SeqCst) {
            return Err(StoreError::LockTimeout(key.to_string()));
        }
        self.inner.update_collection_progress(key, progress).await
    }

    async fn lock_user_metrics(&mut self, key: CollectionKey) -> StoreResult<UserInteraction> {
        self.inner.lock_user_metrics(key).await
    }

    async fn insert_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<bool> {
        self.inner.insert_user_metrics(key, metrics).await
    }

    async fn update_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<()> {
        self.inner.update_user_metrics(key, metrics).await
    }

    async fn lock_collection_metrics(
        &mut self,
        collection_id: Uuid,
    ) -> StoreResult<CollectionCounters> {
        self.inner.lock_collection_metrics(collection_id).await
    }

    async fn insert_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<bool> {
        self.inner
            .insert_collection_metrics(collection_id, counters)
            .await
    }

    async fn update_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<()> {
        self.inner
            .update_collection_metrics(collection_id, counters)
            .await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit().await
    }
}
