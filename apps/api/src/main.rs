mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod pricing;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, MediaBackend, StoreBackend};
use crate::db::connect_and_migrate;
use crate::llm_client::LlmClient;
use crate::pricing::notes::{LlmNoteRefiner, NoteRefiner};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::json_file::JsonFileStore;
use crate::storage::media::{LocalMediaStore, MediaStore, S3MediaStore};
use crate::storage::postgres::PgRecommendationStore;
use crate::storage::RecommendationStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing backend variables)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FairPrice API v{}", env!("CARGO_PKG_VERSION"));

    // Recommendation history
    let store: Arc<dyn RecommendationStore> = match &config.store {
        StoreBackend::JsonFile { path } => {
            info!("Recommendation history in {}", path.display());
            Arc::new(JsonFileStore::new(path.clone()))
        }
        StoreBackend::Postgres { database_url } => {
            let pool = connect_and_migrate(database_url).await?;
            Arc::new(PgRecommendationStore::new(pool))
        }
    };

    // Media storage
    let media: Arc<dyn MediaStore> = match &config.media {
        MediaBackend::Local { dir } => {
            info!("Media stored under {}", dir.display());
            Arc::new(LocalMediaStore::new(dir.clone()))
        }
        MediaBackend::S3 {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            let client = build_s3_client(endpoint, access_key_id, secret_access_key).await;
            info!("Media stored in bucket '{bucket}' at {endpoint}");
            Arc::new(S3MediaStore::new(client, bucket.clone()))
        }
    };

    // Optional note refiner (deterministic notes only without an API key)
    let refiner: Option<Arc<dyn NoteRefiner>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.note_refine_timeout)?;
            info!("Note refiner enabled (model: {})", llm_client::MODEL);
            Some(Arc::new(LlmNoteRefiner(llm)))
        }
        None => {
            info!("ANTHROPIC_API_KEY not set; using deterministic notes");
            None
        }
    };

    let state = AppState {
        store,
        media,
        refiner,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the operator dashboard domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for MinIO (local) or AWS (production).
async fn build_s3_client(
    endpoint: &str,
    access_key_id: &str,
    secret_access_key: &str,
) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        "fairprice-static",
    );

    let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(endpoint)
        .load()
        .await;

    // MinIO only serves path-style bucket URLs
    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
