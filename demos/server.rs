//! Runnable server over PostgreSQL and S3.
//!
//! Run from repo root: `cargo run --example server`

use digiurban::{app, ensure_database_exists, ensure_tables, AppState, PgStore, S3Storage, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("digiurban=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let store = PgStore::connect(&settings).await?;
    ensure_tables(store.pool(), store.schema()).await?;

    let storage = S3Storage::from_settings(&settings).await;
    let state = AppState::from_settings(Arc::new(store), Arc::new(storage), &settings);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("DigiUrban listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
