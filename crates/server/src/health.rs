use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use docbot_discord::dispatcher::InteractionDispatcher;
use docbot_discord::gateway::GatewayStatus;
use docbot_discord::registry::HandlerKind;
use docbot_docs::{DocGraphStore, DocIndexCache};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub dispatcher: Arc<InteractionDispatcher>,
    pub graphs: Arc<DocGraphStore>,
    pub mdn_index: Arc<DocIndexCache>,
    pub gateway: GatewayStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub registry: HealthCheck,
    pub gateway: HealthCheck,
    pub mdn_index: HealthCheck,
    pub djs_docs: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Ready once commands are registered and the gateway runner is still alive.
/// The doc caches fill lazily on first use, so an empty cache is reported but
/// does not degrade the service.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let registry = registry_check(&state.dispatcher);
    let gateway = gateway_check(&state.gateway);
    let ready = registry.status == "ready" && gateway.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        registry,
        gateway,
        mdn_index: mdn_index_check(&state.mdn_index).await,
        djs_docs: djs_docs_check(&state.graphs).await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn registry_check(dispatcher: &InteractionDispatcher) -> HealthCheck {
    let registry = dispatcher.registry();
    let commands = registry.count(HandlerKind::SlashCommand);
    if commands == 0 {
        return HealthCheck {
            status: "degraded",
            detail: "no slash commands registered".to_string(),
        };
    }
    HealthCheck {
        status: "ready",
        detail: format!("{commands} slash commands, {} handlers in total", registry.len()),
    }
}

fn gateway_check(gateway: &GatewayStatus) -> HealthCheck {
    if gateway.is_stopped() {
        return HealthCheck { status: "degraded", detail: "gateway runner stopped".to_string() };
    }
    HealthCheck { status: "ready", detail: "gateway runner active".to_string() }
}

async fn mdn_index_check(index: &DocIndexCache) -> HealthCheck {
    let snapshot = index.current().await;
    match snapshot.refreshed_at() {
        Some(refreshed_at) => HealthCheck {
            status: "ready",
            detail: format!(
                "{} pages indexed, refreshed {}s ago",
                snapshot.len(),
                refreshed_at.elapsed().as_secs()
            ),
        },
        None => HealthCheck { status: "pending", detail: "index not loaded yet".to_string() },
    }
}

async fn djs_docs_check(graphs: &DocGraphStore) -> HealthCheck {
    let cached = graphs.cached_sources().await;
    let known = graphs.sources().len();
    HealthCheck {
        status: if cached == 0 { "pending" } else { "ready" },
        detail: format!("{cached} of {known} sources cached"),
    }
}
