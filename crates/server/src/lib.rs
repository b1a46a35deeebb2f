//! SchoolHub server library
//!
//! REST endpoints for posts, messages, modules, evaluations and file
//! uploads, plus realtime chat delivery over WebSocket.

pub mod blobs;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod presence;
pub mod store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blobs::{BlobStore, FileBlobStore};
use config::{AppState, ServerConfig, StoreKind};
use handlers::{
    add_evaluation, delete_module, delete_post, download_file, list_evaluations, list_messages,
    list_modules, list_posts, online_users, send_message, student_evaluations, upload_file,
    upload_module, upload_post, ws_upgrade,
};
use store::{DocumentStore, JsonDocumentStore, MemoryStore};

const DEFAULT_LOG_FILTER: &str = "schoolhub_server=info,tower_http=info";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // Already set (tests, embedding), ignore
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Open the stores described by `config` and assemble the shared state.
pub async fn build_state(config: ServerConfig) -> anyhow::Result<AppState> {
    config.ensure_dirs().await?;

    let store: Arc<dyn DocumentStore> = match config.store {
        StoreKind::Json => Arc::new(JsonDocumentStore::new(&config.documents_dir).await?),
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };
    let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(&config.uploads_dir).await?);

    Ok(AppState::new(config, store, blobs))
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes());

    Router::new()
        // Timeline
        .route("/posts", get(list_posts))
        .route("/uploadPost", post(upload_post))
        .route("/posts/{id}", delete(delete_post))
        // Chat
        .route("/messages", get(list_messages))
        .route("/sendMessage", post(send_message))
        .route("/online", get(online_users))
        .route("/ws", get(ws_upgrade))
        // Learning modules
        .route("/modules", get(list_modules))
        .route("/uploadModule", post(upload_module))
        .route("/modules/{id}", delete(delete_module))
        // Evaluations
        .route("/addEvaluation", post(add_evaluation))
        .route("/evaluations", get(list_evaluations))
        .route("/evaluations/{student_id}", get(student_evaluations))
        // Files
        .route("/upload", post(upload_file).layer(upload_limit))
        .route("/files/{key}", get(download_file))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

pub async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    info!("=== SchoolHub Server ===");
    info!("Data root: {:?}", config.root_dir);
    info!("Document store: {:?}", config.store);
    info!("Echo to sender: {}", config.echo_to_sender);

    let addr = config.socket_addr();
    let state = build_state(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - SchoolHub Server"
}
