//! Collection progress and interaction endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::Result;
use crate::models::{CollectionKey, CollectionMetricsView, CollectionProgressResponse};
use crate::routes::auth::AuthenticatedUser;
use crate::routes::parse_id;
use crate::AppState;

/// GET /api/collections/:collection_id/progress
///
/// Reports zeros when the user has not answered any card yet.
pub async fn progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(collection_id): Path<String>,
) -> Result<Json<CollectionProgressResponse>> {
    let collection_id = parse_id("collection_id", &collection_id)?;
    let progress = state
        .collections
        .get(collection_id, auth.user_id)
        .await?
        .unwrap_or_default();

    Ok(Json(CollectionProgressResponse::new(
        CollectionKey::new(auth.user_id, collection_id),
        progress,
    )))
}

/// GET /api/collections/:collection_id/metrics
pub async fn metrics(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(collection_id): Path<String>,
) -> Result<Json<CollectionMetricsView>> {
    let collection_id = parse_id("collection_id", &collection_id)?;
    let view = state.social.metrics(collection_id, auth.user_id).await?;
    Ok(Json(view))
}

/// PUT /api/collections/:collection_id/like
pub async fn like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(collection_id): Path<String>,
) -> Result<Json<CollectionMetricsView>> {
    let collection_id = parse_id("collection_id", &collection_id)?;
    let view = state.social.like(collection_id, auth.user_id).await?;
    Ok(Json(view))
}

/// PUT /api/collections/:collection_id/dislike
pub async fn dislike(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(collection_id): Path<String>,
) -> Result<Json<CollectionMetricsView>> {
    let collection_id = parse_id("collection_id", &collection_id)?;
    let view = state.social.dislike(collection_id, auth.user_id).await?;
    Ok(Json(view))
}

/// PUT /api/collections/:collection_id/view
pub async fn view(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(collection_id): Path<String>,
) -> Result<StatusCode> {
    let collection_id = parse_id("collection_id", &collection_id)?;
    state.social.view(collection_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/collections/:collection_id/star
pub async fn star(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(collection_id): Path<String>,
) -> Result<StatusCode> {
    let collection_id = parse_id("collection_id", &collection_id)?;
    state.social.star(collection_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
