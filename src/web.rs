//! HTTP status API
//!
//! Read-only view of the poller plus a manual refresh trigger. The server
//! doubles as the host for the poller's ready signal: it fires once the
//! listener is bound.

use crate::config::{AccessoryConfig, Config};
use crate::conversion::{UnitConversion, format_display};
use crate::error::PricewatchError;
use crate::host::ReadySignal;
use crate::poller::PollerHandle;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub poller: PollerHandle,
    pub accessory: AccessoryConfig,
    pub conversion: UnitConversion,
    /// Redacted configuration, serialized once at startup
    pub config: Arc<serde_json::Value>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(poller: PollerHandle, config: &Config) -> Self {
        let redacted = serde_json::to_value(config.redacted())
            .unwrap_or(serde_json::json!({"error":"serialization"}));
        Self {
            poller,
            accessory: config.accessory.clone(),
            conversion: config.conversion,
            config: Arc::new(redacted),
            version: crate::APP_VERSION,
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "ok", "version": state.version})),
    )
}

pub async fn price(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.current_reading() {
        Some(r) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "name": state.accessory.name,
                "value": r.value,
                "display": format_display(r.value),
                "fallback": r.fallback,
                "source": r.source,
                "fetched_at": r.fetched_at.to_rfc3339(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no price published yet"})),
        ),
    }
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.poller.stats();
    Json(serde_json::json!({
        "version": state.version,
        "accessory": {
            "name": state.accessory.name,
            "manufacturer": state.accessory.manufacturer,
            "model": state.accessory.model,
        },
        "state": state.poller.state().as_str(),
        "conversion": state.conversion.label(),
        "current_value": state.poller.current_value(),
        "cycles": stats.cycles,
        "failures": stats.failures,
        "last_error": stats.last_error,
        "last_success_at": stats.last_success_at.map(|t| t.to_rfc3339()),
        "next_poll_at": stats.next_poll_at.map(|t| t.to_rfc3339()),
    }))
}

pub async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.refresh_now() {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"ok": true})),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        ),
    }
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.as_ref().clone())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/price", get(price))
        .route("/api/status", get(status))
        .route("/api/refresh", post(refresh))
        .route("/api/config", get(get_config))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Resolve the bind address; unparseable hosts fall back to loopback
pub fn bind_addr(host: &str, port: u16) -> (SocketAddr, bool) {
    match host.parse::<IpAddr>() {
        Ok(ip) => (SocketAddr::new(ip, port), true),
        Err(_) => (([127, 0, 0, 1], port).into(), false),
    }
}

/// Bind, fire `ready` once listening, then serve until the task is aborted
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    ready: Option<ReadySignal>,
) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let (addr, parsed_ok) = bind_addr(host, port);
    if !parsed_ok {
        logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PricewatchError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{}",
        local_addr.ip(),
        local_addr.port()
    ));
    if let Some(signal) = ready {
        signal.notify();
    }

    axum::serve(listener, router).await?;
    Ok(())
}
