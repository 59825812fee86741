//! Umpire schedule backend entrypoint wiring configuration, storage and the REST layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use umpire_schedule_back::{
    config::{AppConfig, StorageBackend},
    dao::cell_store::memory::MemoryCellStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config.clone());

    match config.backend {
        StorageBackend::Memory => {
            let store = MemoryCellStore::new(config.lock.wait);
            app_state.set_cell_store(Arc::new(store)).await;
            info!("using in-memory storage; data is lost on restart");
        }
        StorageBackend::Mongo => spawn_mongo_supervisor(app_state.clone(), &config)?,
    }

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connect to MongoDB in the background; the API answers 503 until the store is installed.
#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState, config: &AppConfig) -> anyhow::Result<()> {
    use umpire_schedule_back::{
        dao::{
            cell_store::{
                CellStore,
                mongodb::{MongoCellStore, MongoConfig},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let lock = config.lock.clone();
    tokio::spawn(storage_supervisor::run(state, move || {
        let lock = lock.clone();
        async move {
            let mongo = MongoConfig::from_env()
                .await?
                .with_lock_timing(lock.wait, lock.lease);
            let store = MongoCellStore::connect(mongo).await?;
            Ok::<Arc<dyn CellStore>, StorageError>(Arc::new(store))
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: SharedState, _config: &AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("the mongo backend needs a build with the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
