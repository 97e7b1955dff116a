//! PostgreSQL aggregate store

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::{AggregateStore, StoreTransaction};
use crate::models::*;

/// Store backed by a connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        lock_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        Ok(Self::from_pool(pool, lock_timeout))
    }

    pub fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AggregateStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await?;

        // Scoped to this transaction only
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgTransaction { tx }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Postgres reports `lock_not_available` when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

fn lock_error(err: sqlx::Error, what: impl std::fmt::Display) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
            StoreError::LockTimeout(what.to_string())
        }
        _ => StoreError::Database(err),
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    // === Card Progress ===

    async fn lock_card_progress(&mut self, key: CardKey) -> StoreResult<CardProgress> {
        let row = sqlx::query_as::<_, DbCardProgress>(
            r#"
            SELECT user_id, card_id, status, level, created_at, updated_at
            FROM card_progress
            WHERE user_id = $1 AND card_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.user_id)
        .bind(key.card_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?
        .ok_or_else(|| StoreError::not_found("card progress", key))?;

        Ok(row.to_core()?)
    }

    async fn insert_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO card_progress (user_id, card_id, status, level)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, card_id) DO NOTHING
            "#,
        )
        .bind(key.user_id)
        .bind(key.card_id)
        .bind(progress.status().as_str())
        .bind(i16::from(progress.level().value()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_card_progress(
        &mut self,
        key: CardKey,
        progress: &CardProgress,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE card_progress
            SET status = $3, level = $4, updated_at = NOW()
            WHERE user_id = $1 AND card_id = $2
            "#,
        )
        .bind(key.user_id)
        .bind(key.card_id)
        .bind(progress.status().as_str())
        .bind(i16::from(progress.level().value()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("card progress", key));
        }
        Ok(())
    }

    // === Collection Progress ===

    async fn lock_collection_progress(
        &mut self,
        key: CollectionKey,
    ) -> StoreResult<CollectionProgress> {
        let row = sqlx::query_as::<_, DbCollectionProgress>(
            r#"
            SELECT user_id, collection_id, mastered, reviewing, learning, created_at, updated_at
            FROM collection_progress
            WHERE user_id = $1 AND collection_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.user_id)
        .bind(key.collection_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?
        .ok_or_else(|| StoreError::not_found("collection progress", key))?;

        Ok(row.to_core())
    }

    async fn insert_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO collection_progress (user_id, collection_id, mastered, reviewing, learning)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, collection_id) DO NOTHING
            "#,
        )
        .bind(key.user_id)
        .bind(key.collection_id)
        .bind(to_db_count(progress.mastered))
        .bind(to_db_count(progress.reviewing))
        .bind(to_db_count(progress.learning))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_collection_progress(
        &mut self,
        key: CollectionKey,
        progress: &CollectionProgress,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE collection_progress
            SET mastered = $3, reviewing = $4, learning = $5, updated_at = NOW()
            WHERE user_id = $1 AND collection_id = $2
            "#,
        )
        .bind(key.user_id)
        .bind(key.collection_id)
        .bind(to_db_count(progress.mastered))
        .bind(to_db_count(progress.reviewing))
        .bind(to_db_count(progress.learning))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("collection progress", key));
        }
        Ok(())
    }

    // === Collection User Metrics ===

    async fn lock_user_metrics(&mut self, key: CollectionKey) -> StoreResult<UserInteraction> {
        let row = sqlx::query_as::<_, DbCollectionUserMetrics>(
            r#"
            SELECT user_id, collection_id, liked, disliked, viewed, starred, created_at, updated_at
            FROM collection_user_metrics
            WHERE user_id = $1 AND collection_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.user_id)
        .bind(key.collection_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?
        .ok_or_else(|| StoreError::not_found("collection user metrics", key))?;

        Ok(row.to_core())
    }

    async fn insert_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO collection_user_metrics
                (user_id, collection_id, liked, disliked, viewed, starred)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, collection_id) DO NOTHING
            "#,
        )
        .bind(key.user_id)
        .bind(key.collection_id)
        .bind(metrics.liked)
        .bind(metrics.disliked)
        .bind(metrics.viewed)
        .bind(metrics.starred)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_user_metrics(
        &mut self,
        key: CollectionKey,
        metrics: &UserInteraction,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE collection_user_metrics
            SET liked = $3, disliked = $4, viewed = $5, starred = $6, updated_at = NOW()
            WHERE user_id = $1 AND collection_id = $2
            "#,
        )
        .bind(key.user_id)
        .bind(key.collection_id)
        .bind(metrics.liked)
        .bind(metrics.disliked)
        .bind(metrics.viewed)
        .bind(metrics.starred)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, key))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("collection user metrics", key));
        }
        Ok(())
    }

    // === Collection Metrics ===

    async fn lock_collection_metrics(
        &mut self,
        collection_id: Uuid,
    ) -> StoreResult<CollectionCounters> {
        let row = sqlx::query_as::<_, DbCollectionMetrics>(
            r#"
            SELECT collection_id, likes, dislikes, views, created_at, updated_at
            FROM collection_metrics
            WHERE collection_id = $1
            FOR UPDATE
            "#,
        )
        .bind(collection_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, collection_id))?
        .ok_or_else(|| StoreError::not_found("collection metrics", collection_id))?;

        Ok(row.to_core())
    }

    async fn insert_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO collection_metrics (collection_id, likes, dislikes, views)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection_id) DO NOTHING
            "#,
        )
        .bind(collection_id)
        .bind(to_db_count(counters.likes))
        .bind(to_db_count(counters.dislikes))
        .bind(to_db_count(counters.views))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, collection_id))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_collection_metrics(
        &mut self,
        collection_id: Uuid,
        counters: &CollectionCounters,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE collection_metrics
            SET likes = $2, dislikes = $3, views = $4, updated_at = NOW()
            WHERE collection_id = $1
            "#,
        )
        .bind(collection_id)
        .bind(to_db_count(counters.likes))
        .bind(to_db_count(counters.dislikes))
        .bind(to_db_count(counters.views))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, collection_id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("collection metrics", collection_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }
}
