//! Card answer endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::error::Result;
use crate::models::{CollectionKey, CollectionProgressResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::routes::parse_id;
use crate::AppState;

/// PUT /api/cards/:card_id/collections/:collection_id/know
pub async fn know(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((card_id, collection_id)): Path<(String, String)>,
) -> Result<Json<CollectionProgressResponse>> {
    let card_id = parse_id("card_id", &card_id)?;
    let collection_id = parse_id("collection_id", &collection_id)?;

    let progress = state
        .cards
        .know(collection_id, card_id, auth.user_id)
        .await?;

    Ok(Json(CollectionProgressResponse::new(
        CollectionKey::new(auth.user_id, collection_id),
        progress,
    )))
}

/// PUT /api/cards/:card_id/collections/:collection_id/dont-know
pub async fn dont_know(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path((card_id, collection_id)): Path<(String, String)>,
) -> Result<Json<CollectionProgressResponse>> {
    let card_id = parse_id("card_id", &card_id)?;
    let collection_id = parse_id("collection_id", &collection_id)?;

    let progress = state
        .cards
        .dont_know(collection_id, card_id, auth.user_id)
        .await?;

    Ok(Json(CollectionProgressResponse::new(
        CollectionKey::new(auth.user_id, collection_id),
        progress,
    )))
}
