//! Database models, record keys and API types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Re-export shared types from vocab-core
pub use vocab_core::types::{
    CardProgress, CardStatus, CollectionCounters, CollectionProgress, CounterDelta, Level,
    ProgressDelta, UserInteraction,
};

// === Record Keys ===

/// Key of a per-user, per-card progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardKey {
    pub user_id: Uuid,
    pub card_id: Uuid,
}

impl CardKey {
    pub fn new(user_id: Uuid, card_id: Uuid) -> Self {
        Self { user_id, card_id }
    }
}

impl fmt::Display for CardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} card {}", self.user_id, self.card_id)
    }
}

/// Key of a per-user, per-collection row (progress or interaction flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub user_id: Uuid,
    pub collection_id: Uuid,
}

impl CollectionKey {
    pub fn new(user_id: Uuid, collection_id: Uuid) -> Self {
        Self {
            user_id,
            collection_id,
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} collection {}", self.user_id, self.collection_id)
    }
}

// === Database Entity Types ===

/// Card progress in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbCardProgress {
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub status: String,
    pub level: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCardProgress {
    /// Convert to vocab-core CardProgress, validating the status/level pair
    pub fn to_core(&self) -> vocab_core::Result<CardProgress> {
        let status = self.status.parse::<CardStatus>()?;
        let level = Level::try_from(self.level)?;
        CardProgress::new(status, level)
    }
}

/// Collection progress counters in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbCollectionProgress {
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub mastered: i32,
    pub reviewing: i32,
    pub learning: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCollectionProgress {
    pub fn to_core(&self) -> CollectionProgress {
        CollectionProgress {
            mastered: from_db_count(self.mastered),
            reviewing: from_db_count(self.reviewing),
            learning: from_db_count(self.learning),
        }
    }
}

/// Per-user collection flags in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbCollectionUserMetrics {
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub liked: bool,
    pub disliked: bool,
    pub viewed: bool,
    pub starred: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCollectionUserMetrics {
    pub fn to_core(&self) -> UserInteraction {
        UserInteraction {
            liked: self.liked,
            disliked: self.disliked,
            viewed: self.viewed,
            starred: self.starred,
        }
    }
}

/// Global collection counters in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbCollectionMetrics {
    pub collection_id: Uuid,
    pub likes: i32,
    pub dislikes: i32,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCollectionMetrics {
    pub fn to_core(&self) -> CollectionCounters {
        CollectionCounters {
            likes: from_db_count(self.likes),
            dislikes: from_db_count(self.dislikes),
            views: from_db_count(self.views),
        }
    }
}

/// Counter columns carry a `>= 0` check constraint.
fn from_db_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

pub fn to_db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// === API Request/Response Types ===

/// Per-user progress counters of one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionProgressResponse {
    pub collection_id: Uuid,
    pub user_id: Uuid,
    pub mastered: u32,
    pub reviewing: u32,
    pub learning: u32,
}

impl CollectionProgressResponse {
    pub fn new(key: CollectionKey, progress: CollectionProgress) -> Self {
        Self {
            collection_id: key.collection_id,
            user_id: key.user_id,
            mastered: progress.mastered,
            reviewing: progress.reviewing,
            learning: progress.learning,
        }
    }
}

/// Global counters of a collection merged with one user's flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetricsView {
    pub collection_id: Uuid,
    pub user_id: Uuid,
    pub likes: u32,
    pub dislikes: u32,
    pub views: u32,
    pub liked: bool,
    pub disliked: bool,
    pub viewed: bool,
    pub starred: bool,
}

impl CollectionMetricsView {
    pub fn merge(key: CollectionKey, counters: CollectionCounters, user: UserInteraction) -> Self {
        Self {
            collection_id: key.collection_id,
            user_id: key.user_id,
            likes: counters.likes,
            dislikes: counters.dislikes,
            views: counters.views,
            liked: user.liked,
            disliked: user.disliked,
            viewed: user.viewed,
            starred: user.starred,
        }
    }
}
