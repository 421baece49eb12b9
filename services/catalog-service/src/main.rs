mod config;
mod file_store;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use wc_api_types::epoch_ms;
use wc_catalog::{Catalog, CatalogSource};
use wc_configurator_core::refresh::persist_refreshed;
use wc_configurator_core::{AutoRefreshPolicy, CatalogRefresher, ConfiguratorError};
use wc_sheets_client::{SheetsClient, SheetsConfig};
use wc_storage::{CatalogPersistence, ZstdCompressor};

use crate::config::ServiceConfig;
use crate::file_store::FileStore;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogResponse {
    #[serde(flatten)]
    catalog: Catalog,
    last_data_refresh: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    vehicles: usize,
    wheels: usize,
    stored: String,
    refreshed_at: u64,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

type Persistence = CatalogPersistence<FileStore, ZstdCompressor>;

struct AppState<S> {
    refresher: CatalogRefresher<S>,
    persistence: Mutex<Persistence>,
    policy: AutoRefreshPolicy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;
    let sheets = SheetsConfig::from_env();
    let sheets_ready = match sheets.validate() {
        Ok(()) => true,
        Err(err) => {
            warn!("{err:#}; serving the stored catalog without refreshing");
            false
        }
    };

    let store = FileStore::open(&config.store_path)?;
    info!("catalog store at {}", store.path().display());
    let persistence = CatalogPersistence::new(store, ZstdCompressor::default())
        .with_quota(config.quota_bytes);

    let state = Arc::new(AppState {
        refresher: CatalogRefresher::new(SheetsClient::new(sheets)),
        persistence: Mutex::new(persistence),
        policy: AutoRefreshPolicy::new(config.auto_refresh_ms),
    });

    if sheets_ready {
        let last_refresh = state.persistence.lock().await.last_refresh();
        if state.policy.is_due(last_refresh, epoch_ms()) {
            if let Err(err) = run_refresh(&state).await {
                warn!("startup refresh failed: {err}");
            }
        }
        tokio::spawn(auto_refresh(state.clone()));
    }

    let app = router(state);

    info!("catalog-service listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: CatalogSource + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/catalog", get(get_catalog::<S>))
        .route("/catalog/refresh", post(refresh_catalog::<S>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "catalog-service",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "catalog-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_catalog<S>(State(state): State<Arc<AppState<S>>>) -> Json<CatalogResponse>
where
    S: CatalogSource + Send + Sync + 'static,
{
    let persistence = state.persistence.lock().await;
    Json(CatalogResponse {
        catalog: persistence.load_catalog_or_builtin(),
        last_data_refresh: persistence.last_refresh(),
    })
}

async fn refresh_catalog<S>(State(state): State<Arc<AppState<S>>>) -> ApiResult<RefreshResponse>
where
    S: CatalogSource + Send + Sync + 'static,
{
    run_refresh(&state).await.map(Json).map_err(|err| {
        let status = match err {
            ConfiguratorError::RefreshInFlight => StatusCode::CONFLICT,
            ConfiguratorError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    })
}

async fn run_refresh<S>(state: &AppState<S>) -> Result<RefreshResponse, ConfiguratorError>
where
    S: CatalogSource + Send + Sync,
{
    let catalog = state.refresher.refresh().await?;
    let refreshed_at = epoch_ms();

    let mut persistence = state.persistence.lock().await;
    let outcome = persist_refreshed(&mut persistence, &catalog, refreshed_at)?;

    Ok(RefreshResponse {
        vehicles: catalog.vehicles.len(),
        wheels: catalog.wheels.len(),
        stored: format!("{outcome:?}").to_lowercase(),
        refreshed_at,
    })
}

async fn auto_refresh<S>(state: Arc<AppState<S>>)
where
    S: CatalogSource + Send + Sync,
{
    let Some(period) = state.policy.interval() else {
        info!("auto refresh disabled");
        return;
    };

    let mut ticker = tokio::time::interval(period);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !state.policy.should_run(false, state.refresher.is_refreshing()) {
            debug!("skipping auto refresh tick");
            continue;
        }
        match run_refresh(&state).await {
            Ok(summary) => info!(
                "auto refresh stored {} vehicles and {} wheels",
                summary.vehicles, summary.wheels
            ),
            Err(err) => warn!("auto refresh failed: {err}"),
        }
    }
}
