//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MokaChatSessionStore, OpenAiLlmAdapter},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, AppState, LlmBackends},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::Router;
use roadmap_core::memory::InMemoryRepository;
use roadmap_core::ports::{ContentStore, RoadmapRepository};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// How long shutdown waits for queued generation work to drain.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let (repo, store): (Arc<dyn RoadmapRepository>, Arc<dyn ContentStore>) =
        match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                (
                    db_adapter.clone() as Arc<dyn RoadmapRepository>,
                    db_adapter as Arc<dyn ContentStore>,
                )
            }
            None => {
                warn!("DATABASE_URL is not set; journeys are kept in memory and lost on restart.");
                let memory = Arc::new(InMemoryRepository::new());
                (
                    memory.clone() as Arc<dyn RoadmapRepository>,
                    memory as Arc<dyn ContentStore>,
                )
            }
        };

    // --- 3. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(config.require_openai_key()?);
    if let Some(base) = &config.openai_api_base {
        openai_config = openai_config.with_api_base(base);
    }
    let openai_client = Client::with_config(openai_config);

    let llms = LlmBackends {
        content: Arc::new(OpenAiLlmAdapter::new(
            openai_client.clone(),
            config.content_model.clone(),
        )),
        roadmap: Arc::new(OpenAiLlmAdapter::new(
            openai_client.clone(),
            config.roadmap_model.clone(),
        )),
        chat: Arc::new(OpenAiLlmAdapter::new(
            openai_client,
            config.chat_model.clone(),
        )),
    };
    let sessions = Arc::new(MokaChatSessionStore::new(
        config.chat_session_capacity,
        config.chat_session_idle,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(config.clone(), repo, store, llms, sessions));
    let queue = app_state.queue.clone();

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(web::middleware::USER_ID_HEADER),
        ]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Drain Background Generation ---
    let snapshot = queue.snapshot();
    if snapshot.processing {
        info!(
            "Waiting for {} pending and {} in-flight generation task(s)...",
            snapshot.pending, snapshot.in_flight
        );
        if tokio::time::timeout(SHUTDOWN_DRAIN, queue.wait_idle()).await.is_err() {
            let left = queue.snapshot();
            warn!(
                "Shutting down with {} pending and {} in-flight task(s); they will be regenerated on demand.",
                left.pending, left.in_flight
            );
        }
    }
    info!("Server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
