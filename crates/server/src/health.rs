use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use permitdesk_agent::runtime::AgentRuntime;
use permitdesk_agent::tools::CatalogStatus;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub tool_catalog: HealthCheck,
    pub tools: usize,
    pub checked_at: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { runtime })
}

/// Ready once the catalog handshake succeeded. Before the first handshake the
/// service still reports ready; a failed handshake reports degraded.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let (tool_catalog, tools) = catalog_check(state.runtime.catalog_status());
    let ready = tool_catalog.status != "degraded";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "permitdesk-server runtime initialized".to_string() },
        tool_catalog,
        tools,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn catalog_check(status: Option<CatalogStatus>) -> (HealthCheck, usize) {
    match status {
        Some(CatalogStatus::Connected { tools }) => {
            (HealthCheck { status: "ready", detail: format!("record api catalog connected with {tools} tools") }, tools)
        }
        Some(CatalogStatus::Unavailable { error }) => {
            (HealthCheck { status: "degraded", detail: format!("record api catalog unavailable: {error}") }, 0)
        }
        None => (HealthCheck { status: "pending", detail: "catalog handshake has not run yet".to_string() }, 0),
    }
}
