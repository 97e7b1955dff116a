//! Card progress engine.
//!
//! Moves a card along the ladder and keeps the collection counters in step.
//! The card write and the counter write happen in one transaction: the
//! collection row is locked first, then the card row.

use std::sync::Arc;

use uuid::Uuid;
use vocab_core::ladder::{self, Signal};

use crate::db::{self, AggregateStore, OptionalRecord, StoreResult};
use crate::models::{CardKey, CardProgress, CollectionKey, CollectionProgress};
use crate::services::collection_progress::CollectionProgressAggregator;

#[derive(Clone)]
pub struct CardProgressEngine {
    store: Arc<dyn AggregateStore>,
}

impl CardProgressEngine {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    /// The user knew the card. Returns the collection counters after the step.
    pub async fn know(
        &self,
        collection_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<CollectionProgress> {
        self.record(collection_id, card_id, user_id, Signal::Know)
            .await
    }

    /// The user did not know the card. Returns the collection counters after the step.
    pub async fn dont_know(
        &self,
        collection_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<CollectionProgress> {
        self.record(collection_id, card_id, user_id, Signal::DontKnow)
            .await
    }

    /// Current ladder position of a card, if the user ever answered it.
    pub async fn card(&self, card_id: Uuid, user_id: Uuid) -> StoreResult<Option<CardProgress>> {
        let mut tx = self.store.begin().await?;
        let progress = tx
            .lock_card_progress(CardKey::new(user_id, card_id))
            .await
            .optional()?;
        tx.commit().await?;
        Ok(progress)
    }

    async fn record(
        &self,
        collection_id: Uuid,
        card_id: Uuid,
        user_id: Uuid,
        signal: Signal,
    ) -> StoreResult<CollectionProgress> {
        let collection = CollectionKey::new(user_id, collection_id);
        let card = CardKey::new(user_id, card_id);

        let mut tx = self.store.begin().await?;
        let totals = CollectionProgressAggregator::ensure_in(tx.as_mut(), collection).await?;

        let first = ladder::first_contact(signal);
        let (current, created) = db::get_or_create(tx.as_mut(), card, || first.next).await?;

        let step = if created {
            Some(first)
        } else {
            let step = ladder::advance(&current, signal);
            if let Some(step) = step {
                tx.update_card_progress(card, &step.next).await?;
            }
            step
        };

        let totals = match step {
            Some(step) => {
                tracing::debug!(
                    %card,
                    %collection_id,
                    ?signal,
                    created,
                    level = %step.next.level(),
                    "card moved on ladder"
                );
                CollectionProgressAggregator::apply_delta_in(
                    tx.as_mut(),
                    collection,
                    totals,
                    step.delta,
                )
                .await?
            }
            None => {
                tracing::debug!(%card, ?signal, level = %current.level(), "card at end of ladder");
                totals
            }
        };

        tx.commit().await?;
        Ok(totals)
    }
}
