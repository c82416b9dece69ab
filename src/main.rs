use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use block_fetcher::api::{self, AppState};
use block_fetcher::chain::AlloyChainClient;
use block_fetcher::config::Config;
use block_fetcher::db::{create_pool, SqliteDao};
use block_fetcher::error::{IndexerError, Result};
use block_fetcher::fetcher::Fetcher;
use block_fetcher::indexer::{Indexer, RecordingIndexer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    tracing::info!("Starting block fetcher v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("RPC endpoint: {}", config.ethereum_rpc_url);
    tracing::info!("Database: {}", config.database_path);
    tracing::info!("Worker pool size: {}", config.poll_thread);

    let pool = create_pool(&config.database_path)?;
    let dao: Arc<dyn block_fetcher::db::Dao> = Arc::new(SqliteDao::new(pool));
    dao.init().await?;

    let chain = Arc::new(AlloyChainClient::connect(&config.ethereum_rpc_url)?);

    // Production indexers are out of scope for this engine; the registry
    // ships with a recording reference implementation so the dispatch
    // pipeline has somewhere to deliver events.
    let indexers: Vec<Arc<dyn Indexer>> =
        vec![Arc::new(RecordingIndexer::new("reference", 0))];

    let fetcher = Fetcher::new(dao.clone(), chain, indexers, config.clone());
    fetcher.init().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = fetcher.start(shutdown_rx);

    let state = AppState::new(dao, config.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IndexerError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("API server listening on {addr}");

    let router = api::create_router(state);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(shutdown_tx))
            .await
            .ok();
    });

    tokio::select! {
        _ = handles.join() => {
            tracing::info!("Fetcher tasks finished");
        }
        _ = server_handle => {
            tracing::info!("Server task finished");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    let _ = shutdown_tx.send(true);
}
