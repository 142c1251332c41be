use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::storage::FilesystemBlobStore;
use tracing::{Level, info};

use upload_server::config::AppConfig;
use upload_server::records::SeaOrmRecordStore;
use upload_server::state::AppState;
use upload_server::utils::clock::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = upload_server::database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let storage = &config.storage;
    let blob_store = FilesystemBlobStore::new(storage.root.clone(), storage.max_file_size)
        .await
        .with_context(|| format!("Failed to prepare storage root {}", storage.root.display()))?;
    info!(root = %config.storage.root.display(), "Blob storage ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let sweep_every = Duration::from_secs(config.auth.sweep_interval_secs);

    let state = AppState::new(
        config,
        Arc::new(SeaOrmRecordStore::new(db)),
        Arc::new(blob_store),
        Arc::new(SystemClock),
    );
    upload_server::sweep::spawn_sweep_task(&state, sweep_every);

    let app = upload_server::build_router(state);

    info!("Server running at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
