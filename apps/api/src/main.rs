mod config;
mod db;
mod documents;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod render;
mod routes;
mod sections;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, DispatchMode};
use crate::db::create_pool;
use crate::llm_client::{CompletionCapability, LlmClient};
use crate::render::DocumentRenderer;
use crate::routes::build_router;
use crate::sections::generator::Generators;
use crate::sections::pg_store::PgSectionStore;
use crate::sections::providers::{PgSourceProvider, PgTargetProvider};
use crate::sections::service::{GenerationService, ServiceDeps};
use crate::state::AppState;
use crate::storage::S3ArtifactStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
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

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL (migrations run on connect)
    let db = create_pool(&config.database_url).await?;

    // Redis backs the generation queue
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // S3 / MinIO holds rendered artifacts
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let llm: Arc<dyn CompletionCapability> =
        Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!(model = llm_client::MODEL, "LLM client initialized");

    let generation_config = config.generation.clone();
    let generation = Arc::new(GenerationService::new(
        ServiceDeps {
            store: Arc::new(PgSectionStore::new(db.clone())),
            sources: Arc::new(PgSourceProvider::new(db.clone())),
            targets: Arc::new(PgTargetProvider::new(db.clone())),
            generators: Generators::from_completion(llm.clone()),
            renderer: Arc::new(DocumentRenderer),
            storage: Arc::new(S3ArtifactStorage::new(s3, config.s3_bucket.clone())),
            redis: Some(redis.clone()),
        },
        generation_config.clone(),
    ));
    info!(
        modular = generation_config.modular_enabled,
        fallback = generation_config.fallback_enabled,
        budget = generation_config.worker_budget,
        dispatch = ?generation_config.dispatch,
        "Generation pipeline configured"
    );

    if generation_config.dispatch == DispatchMode::Queue {
        generation
            .queue_consumer(redis)
            .spawn(generation_config.queue_consumers);
        info!(consumers = generation_config.queue_consumers, "Queue consumers started");
    }

    let state = AppState {
        db,
        llm,
        generation,
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict origins once the web client's host is fixed
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "tailor-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
