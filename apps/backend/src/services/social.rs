//! Social interaction engine.
//!
//! Likes, dislikes, views and stars of a collection. A user's first contact
//! with a collection creates their interaction row with `viewed` set, and the
//! same transaction counts that view globally, so `views` always equals the
//! number of users who viewed the collection.

use std::sync::Arc;

use uuid::Uuid;
use vocab_core::toggle::{self, Interaction};

use crate::db::{self, AggregateStore, OptionalRecord, StoreResult};
use crate::models::{
    CollectionCounters, CollectionKey, CollectionMetricsView, CounterDelta, UserInteraction,
};

#[derive(Clone)]
pub struct SocialEngine {
    store: Arc<dyn AggregateStore>,
}

impl SocialEngine {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    /// Toggle the user's like, clearing a dislike first.
    pub async fn like(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<CollectionMetricsView> {
        self.interact(collection_id, user_id, Some(Interaction::Like))
            .await
    }

    /// Toggle the user's dislike, clearing a like first.
    pub async fn dislike(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<CollectionMetricsView> {
        self.interact(collection_id, user_id, Some(Interaction::Dislike))
            .await
    }

    /// Mark the collection viewed. Counts at most once per user.
    pub async fn view(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.interact(collection_id, user_id, Some(Interaction::View))
            .await?;
        Ok(())
    }

    /// Toggle the user's star. Stars have no global counter.
    pub async fn star(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.interact(collection_id, user_id, Some(Interaction::Star))
            .await?;
        Ok(())
    }

    /// Global counters merged with the user's flags. Touches the collection for
    /// the user if this is their first contact.
    pub async fn metrics(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<CollectionMetricsView> {
        self.interact(collection_id, user_id, None).await
    }

    /// Global counters, if anyone ever touched the collection.
    pub async fn totals(&self, collection_id: Uuid) -> StoreResult<Option<CollectionCounters>> {
        let mut tx = self.store.begin().await?;
        let counters = tx.lock_collection_metrics(collection_id).await.optional()?;
        tx.commit().await?;
        Ok(counters)
    }

    /// The user's flags, if they ever touched the collection.
    pub async fn user_state(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<UserInteraction>> {
        let mut tx = self.store.begin().await?;
        let state = tx
            .lock_user_metrics(CollectionKey::new(user_id, collection_id))
            .await
            .optional()?;
        tx.commit().await?;
        Ok(state)
    }

    async fn interact(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
        interaction: Option<Interaction>,
    ) -> StoreResult<CollectionMetricsView> {
        let key = CollectionKey::new(user_id, collection_id);
        let mut tx = self.store.begin().await?;

        // User row before the global row; every path takes them in this order.
        let (current, created) =
            db::get_or_create(tx.as_mut(), key, UserInteraction::first_touch).await?;
        let (counters, _) =
            db::get_or_create(tx.as_mut(), collection_id, CollectionCounters::default).await?;

        let mut delta = if created {
            toggle::first_touch_delta()
        } else {
            CounterDelta::default()
        };
        let mut next = current;
        if let Some(interaction) = interaction {
            let step = toggle::apply(current, interaction);
            next = step.next;
            delta = delta + step.delta;
            tracing::debug!(%key, ?interaction, delta = ?step.delta, "collection interaction");
        }

        if next != current {
            tx.update_user_metrics(key, &next).await?;
        }
        let counters = if delta.is_zero() {
            counters
        } else {
            let updated = counters.apply(delta);
            tx.update_collection_metrics(collection_id, &updated).await?;
            updated
        };

        tx.commit().await?;
        Ok(CollectionMetricsView::merge(key, counters, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use pretty_assertions::assert_eq;

    fn engine() -> SocialEngine {
        SocialEngine::new(Arc::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn first_like_counts_view_and_like() {
        let engine = engine();
        let (collection, user) = (Uuid::new_v4(), Uuid::new_v4());

        let view = engine.like(collection, user).await.unwrap();
        assert_eq!((view.likes, view.dislikes, view.views), (1, 0, 1));
        assert!(view.liked && view.viewed);
    }

    #[tokio::test]
    async fn reads_do_not_create_rows() {
        let engine = engine();
        let (collection, user) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(engine.totals(collection).await.unwrap(), None);
        assert_eq!(engine.user_state(collection, user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn metrics_touches_once() {
        let engine = engine();
        let (collection, user) = (Uuid::new_v4(), Uuid::new_v4());

        engine.metrics(collection, user).await.unwrap();
        let view = engine.metrics(collection, user).await.unwrap();
        assert_eq!(view.views, 1);
        assert_eq!(
            engine.user_state(collection, user).await.unwrap(),
            Some(UserInteraction::first_touch())
        );
    }
}
