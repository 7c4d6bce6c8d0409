//! JSON endpoints. Each handler runs one blocking sampler call off the
//! async runtime and returns its snapshot.

use crate::interfaces::{host_addresses, list_interfaces};
use crate::state::AppState;
use crate::types::{CommandError, MetricsSnapshot, NetRates, UsbDevice, WifiNetwork};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{error, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics", get(metrics))
        .route("/api/network", get(network))
        .route("/api/interfaces", get(interfaces))
        .route("/api/wifi/scan", get(wifi_scan))
        .route("/api/usb/devices", get(usb_devices))
        .route("/api/errors", get(cmd_errors))
        .route("/api/version", get(version))
        .with_state(state)
}

async fn blocking<T, F>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("sampling task failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsSnapshot>, StatusCode> {
    blocking(move || state.resources.snapshot()).await.map(Json)
}

async fn network(State(state): State<AppState>) -> Result<Json<NetRates>, StatusCode> {
    blocking(move || {
        state.network.sample().unwrap_or_else(|e| {
            warn!("network rate unavailable: {e}");
            NetRates::default()
        })
    })
    .await
    .map(Json)
}

async fn interfaces(State(state): State<AppState>) -> Response {
    let paths = state.config.paths.clone();
    match blocking(move || list_interfaces(&paths, &host_addresses())).await {
        Ok(Ok(listing)) => Json(listing).into_response(),
        Ok(Err(e)) => {
            warn!("{e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to list interfaces").into_response()
        }
        Err(code) => code.into_response(),
    }
}

async fn wifi_scan(State(state): State<AppState>) -> Result<Json<Vec<WifiNetwork>>, StatusCode> {
    blocking(move || state.wifi.scan()).await.map(Json)
}

async fn usb_devices(State(state): State<AppState>) -> Result<Json<Vec<UsbDevice>>, StatusCode> {
    blocking(move || state.usb.devices()).await.map(Json)
}

async fn cmd_errors(State(state): State<AppState>) -> Json<Vec<CommandError>> {
    Json(state.cmd_errors.drain())
}

#[derive(Serialize)]
struct Version {
    version: &'static str,
}

async fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION"),
    })
}
