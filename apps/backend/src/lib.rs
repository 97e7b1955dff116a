pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::{AggregateStore, MemoryStore, PgStore};
use crate::routes::auth::TokenVerifier;
use crate::services::{CardProgressEngine, CollectionProgressAggregator, SocialEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cards: CardProgressEngine,
    pub collections: CollectionProgressAggregator,
    pub social: SocialEngine,
    pub tokens: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn AggregateStore>, jwt_secret: &str) -> Self {
        Self {
            cards: CardProgressEngine::new(store.clone()),
            collections: CollectionProgressAggregator::new(store.clone()),
            social: SocialEngine::new(store),
            tokens: Arc::new(TokenVerifier::new(jwt_secret)),
        }
    }
}

/// Build the full router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        // Card routes
        .route(
            "/api/cards/:card_id/collections/:collection_id/know",
            put(routes::cards::know),
        )
        .route(
            "/api/cards/:card_id/collections/:collection_id/dont-know",
            put(routes::cards::dont_know),
        )
        // Collection routes
        .route(
            "/api/collections/:collection_id/progress",
            get(routes::collections::progress),
        )
        .route(
            "/api/collections/:collection_id/metrics",
            get(routes::collections::metrics),
        )
        .route(
            "/api/collections/:collection_id/like",
            put(routes::collections::like),
        )
        .route(
            "/api/collections/:collection_id/dislike",
            put(routes::collections::dislike),
        )
        .route(
            "/api/collections/:collection_id/view",
            put(routes::collections::view),
        )
        .route(
            "/api/collections/:collection_id/star",
            put(routes::collections::star),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn AggregateStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let store = PgStore::connect(
                database_url,
                config.db_max_connections,
                config.db_acquire_timeout,
                config.lock_timeout,
            )
            .await?;

            tracing::info!("Running migrations...");
            store.run_migrations().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping aggregates in memory");
            Arc::new(MemoryStore::new(config.lock_timeout))
        }
    };
    tracing::info!(store = store.name(), "Aggregate store ready");

    let app = build_router(AppState::new(store, &config.jwt_secret));

    let addr = config.bind_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
