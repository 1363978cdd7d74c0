use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use configs::AppConfig;
use tower_http::cors::CorsLayer;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use service::storage::{self, PropertyStore};
use service::{runtime, ListingService};

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address: {e}")))
}

/// Open the configured store and assemble the router.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    runtime::ensure_env(cfg).await?;

    let store = storage::open_store(&cfg.storage).map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    // the first request retries the header check if this one fails
    if let Err(e) = store.ensure_headers().await {
        warn!(backend = store.backend(), error = %e, "header check failed at startup");
    }

    let state = AppState::new(ListingService::new(store));
    Ok(routes::build_router(state, build_cors(), cfg.server.static_dir.as_deref()))
}

/// Read `config.toml` and the environment once; the result drives both the
/// runtime size and the app.
pub fn load_config() -> Result<AppConfig, StartupError> {
    AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(format!("{e:#}")))
}

/// Resolves on Ctrl+C. If the handler cannot be installed it never resolves.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received; draining in-flight requests"),
        Err(e) => {
            error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await
        }
    }
}

/// Serve until `shutdown` resolves, then let in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| StartupError::Any(e.into()))
}

/// Public entry: build the app from `cfg` and serve it until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&cfg).await?;

    let addr = bind_addr(&cfg)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.to_string(), source })?;
    info!(%addr, backend = %cfg.storage.backend, "listening");
    serve(listener, app, shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}
