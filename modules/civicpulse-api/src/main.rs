use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civicpulse_common::Config;
use civicpulse_engine::{
    ComplaintLifecycle, ComplaintStore, DefaultScorer, DeduplicationEngine, HttpScorer,
    SimilarityScorer,
};
use civicpulse_store::PgComplaintStore;

mod image;
mod rest;

use image::{ImageSink, NullImageSink};
use rest::complaints;

pub struct AppState {
    pub engine: DeduplicationEngine,
    pub lifecycle: Arc<ComplaintLifecycle>,
    pub store: Arc<dyn ComplaintStore>,
    pub images: Arc<dyn ImageSink>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("civicpulse=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let pg = PgComplaintStore::new(pool);
    pg.ensure_schema().await?;
    let store: Arc<dyn ComplaintStore> = Arc::new(pg);

    let scorer: Arc<dyn SimilarityScorer> = match &config.scorer_url {
        Some(url) => {
            info!(url, "using remote similarity scorer");
            Arc::new(HttpScorer::new(url.clone()))
        }
        None => Arc::new(DefaultScorer::new(&config.dedup)),
    };

    let engine = DeduplicationEngine::new(store.clone(), scorer, config.dedup.clone());
    let indexed = engine.warm_index().await?;
    info!(indexed, "intake engine ready");

    let state = Arc::new(AppState {
        lifecycle: engine.lifecycle(),
        engine,
        store,
        images: Arc::new(NullImageSink),
    });

    let app = Router::new()
        .route(
            "/api/complaints",
            post(complaints::create_complaint).get(complaints::list_complaints),
        )
        .route("/api/complaints/nearby", get(complaints::nearby_complaints))
        .route("/api/complaints/{id}/start", put(complaints::start_complaint))
        .route("/api/complaints/{id}/resolve", put(complaints::resolve_complaint))
        .route("/api/complaints/{id}/reject", put(complaints::reject_complaint))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
