//! # TaniCare Binary
//!
//! Assembles the application from settings and the compiled-in plugins.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use configs::{Settings, StoreBackend, StoreSettings};
use secrecy::ExposeSecret;
use tc_api::AppState;
use tc_auth_simple::SimpleIdentityProvider;
use tc_core::{AccountService, DocumentStore, ObjectStorage, RegionDirectory, ThreadAggregator};
use tc_storage_local::LocalObjectStorage;
use tc_store_memory::MemoryDocumentStore;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-sqlite")]
use tc_store_sqlite::SqliteDocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(settings.log.json);

    if settings.uses_development_secret() {
        warn!("Using the development JWT secret");
    }

    // 1. Region directory, fixed for the lifetime of the process
    let regions = RegionDirectory::from_path(&settings.regions.path)
        .with_context(|| format!("loading region directory from {}", settings.regions.path))?;
    let regions = Arc::new(regions);

    // 2. Document store
    let store = build_store(&settings.store).await?;

    // 3. Object storage
    let media: Arc<dyn ObjectStorage> = Arc::new(LocalObjectStorage::new(
        PathBuf::from(&settings.media.root),
        settings.media.url_prefix.clone(),
    ));

    // 4. Identity
    let ttl = i64::try_from(settings.auth.token_ttl_secs).context("auth.token_ttl_secs is too large")?;
    let identity = Arc::new(SimpleIdentityProvider::new(
        store.clone(),
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::seconds(ttl),
    ));

    let state = AppState {
        accounts: AccountService::new(identity, store.clone(), media.clone(), regions.clone()),
        threads: ThreadAggregator::new(store),
        regions,
        media,
    };

    let app = tc_api::router(state)
        .nest_service(&settings.media.url_prefix, ServeDir::new(&settings.media.root));

    let address = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, environment = %settings.environment, "TaniCare listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            info!("Using the in-memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        #[cfg(feature = "db-sqlite")]
        StoreBackend::Sqlite => {
            info!(url = %settings.sqlite_url, "Using the SQLite document store");
            let store = SqliteDocumentStore::new(&settings.sqlite_url)
                .await
                .context("opening SQLite document store")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-sqlite"))]
        StoreBackend::Sqlite => {
            anyhow::bail!("store.backend is sqlite but the binary was built without db-sqlite")
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
