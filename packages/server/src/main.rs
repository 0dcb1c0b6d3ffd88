use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use stash_common::storage::filesystem::FilesystemBlobStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stash_server::accounting::FileService;
use stash_server::config::AppConfig;
use stash_server::database::init_db;
use stash_server::seed::ensure_indexes;
use stash_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    ensure_indexes(&db).await;

    let blob_store = Arc::new(
        FilesystemBlobStore::new(config.storage.root.clone())
            .await
            .with_context(|| format!("Failed to open storage root {:?}", config.storage.root))?,
    );
    info!(
        root = %config.storage.root.display(),
        max_bytes = config.storage.max_bytes,
        "Blob store ready"
    );

    let files = FileService::new(
        db.clone(),
        blob_store,
        config.storage.max_bytes,
        config.storage.max_upload_size,
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        config,
        files,
    };
    let app = stash_server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
