mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::{AppState, AppStateInner};
use parley_moderation::{Moderator, wordlist};
use parley_store::{MemoryStorage, SqliteStorage, Storage};

use crate::config::{Config, StorageKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parley_server=debug,parley_api=debug,parley_store=debug,parley_moderation=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Backend selection happens exactly once; handlers only see the trait.
    let store: Arc<dyn Storage> = match &config.storage {
        StorageKind::Memory => {
            info!("using volatile in-memory storage");
            Arc::new(MemoryStorage::new())
        }
        StorageKind::Sqlite(path) => Arc::new(SqliteStorage::open(path)?),
    };

    let blocklist = wordlist::blocklist(config.blocklist_path.as_deref())?;
    let prefilter = wordlist::prefilter(config.prefilter_path.as_deref())?;

    if config.moderation_api_key.is_none() {
        info!(
            "no moderation API key configured; every submission uses the {:?} fallback",
            config.fallback
        );
    }

    let moderator = Moderator::new(
        config.moderation_url.clone(),
        config.moderation_api_key.clone(),
        config.fallback,
        blocklist,
    );

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        store,
        moderator,
        prefilter,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = parley_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
