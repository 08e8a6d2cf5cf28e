mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod preview;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::preview::VariantDeriver;
use crate::storage::{BlobProvider, BlobStore};

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub storage: BlobStore,
    pub deriver: Arc<VariantDeriver>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "one4lib=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;

    let storage = BlobStore::new(&config);
    tracing::info!(
        "Blob store ready ({}) at {}",
        storage.provider().storage_type(),
        config.storage.blob_path
    );
    // Fails at startup when no watermark font can be found; previews
    // must never go out unwatermarked
    let deriver = Arc::new(VariantDeriver::new(&config.watermark)?);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        db,
        config: Arc::new(config),
        storage,
        deriver,
    };

    let app = router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    // No auth: registration, login, signed blob URLs
    let public = Router::new()
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/blobs/:key", get(handlers::blob::serve_blob))
        .route(
            "/api/v1/comments/file/:file_id",
            get(handlers::feedback::comments_for_file),
        )
        .route(
            "/api/v1/ratings/:file_id/average",
            get(handlers::feedback::average_rating),
        );

    // Viewer-scoped: work logged-out, render differently per viewer
    let browse = Router::new()
        .route("/api/v1/files", get(handlers::file::list_files))
        .route("/api/v1/files/:id", get(handlers::file::get_file))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::optional_auth_middleware,
        ));

    let protected = Router::new()
        .route("/api/v1/files/upload", post(handlers::file::upload))
        .route("/api/v1/files/:id/download", get(handlers::file::download))
        .route("/api/v1/purchase/file", post(handlers::purchase::purchase_file))
        .route("/api/v1/purchase/transactions", get(handlers::purchase::purchase_history))
        .route("/api/v1/purchase/bought-files", get(handlers::purchase::bought_files))
        .route("/api/v1/points/balance", get(handlers::points::get_balance))
        .route("/api/v1/points/purchase", post(handlers::points::purchase_points))
        .route("/api/v1/points/transactions", get(handlers::points::transactions))
        .route("/api/v1/comments", post(handlers::feedback::add_comment))
        .route(
            "/api/v1/comments/user/:file_id",
            get(handlers::feedback::own_comments_for_file),
        )
        .route("/api/v1/ratings", post(handlers::feedback::rate_file))
        .route(
            "/api/v1/ratings/:file_id/user",
            get(handlers::feedback::own_rating),
        )
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .merge(public)
        .merge(browse)
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
