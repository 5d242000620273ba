use crate::config::SluiceConfig;
use crate::routes;
use crate::views::Views;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use bridge::IngestBridge;
use diagnostics::{error, info};
use gate::Gate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

/// Everything a request handler needs, shared by every request
pub struct AppState {
    pub gate: Gate,
    pub bridge: IngestBridge,
    pub views: Views,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(gate: Gate, bridge: IngestBridge) -> Result<Self> {
        Ok(Self {
            gate,
            bridge,
            views: Views::new().context("Failed to compile page templates")?,
            static_dir: None,
            max_upload_bytes: 32 * 1024 * 1024,
        })
    }

    pub fn from_config(config: &SluiceConfig) -> Result<Self> {
        let gate = Gate::new(config.credentials.clone(), config.session.clone())?;
        let bridge = IngestBridge::from_config(&config.bridge)
            .context("Failed to set up the ingest bridge")?;

        let mut state = Self::new(gate, bridge)?;
        state.static_dir = config.static_dir.clone();
        state.max_upload_bytes = config.max_upload_bytes;
        Ok(state)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(routes::login_page))
        .route("/login", post(routes::login))
        .route("/logout", post(routes::logout))
        .route("/upload", get(routes::upload_page).post(routes::upload));

    if let Some(dir) = &state.static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

/// Periodically drop expired sessions
pub fn spawn_session_sweeper(state: Arc<AppState>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.gate.sweep().await;
        }
    })
}

/// Serve on `listener` until `shutdown` resolves
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    sweep_every: Duration,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let sweeper = spawn_session_sweeper(state.clone(), sweep_every);
    let app = build_router(state);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server failed");

    sweeper.abort();
    result
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM
pub async fn start_server(config: &SluiceConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    let address = listener.local_addr()?.to_string();
    let warehouse = state.bridge.warehouse().name().to_string();
    let table = state.bridge.warehouse().table();
    let store = state.bridge.blobs().url().to_string();
    info!("Listening on {address}: uploads go to {store}, then {warehouse} table {table}", address, store, warehouse, table);

    serve_with_shutdown(
        listener,
        state,
        config.session.sweep_interval,
        shutdown_signal(),
    )
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                let error = e.to_string();
                error!("Failed to install Ctrl+C handler: {error}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                let error = e.to_string();
                error!("Failed to install signal handler: {error}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
