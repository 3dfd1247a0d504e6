//! HTTP front end: scrape, stats and probe routes with optional bearer auth.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json as AxumJson, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use profile_harvest::{ErrorKind, Harvester};

/// Shared server state passed to all handlers via axum State.
pub struct ServerState {
    pub harvester: Arc<Harvester>,
    pub token: Option<String>,
}

/// Body of `POST /scrape`.
#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub target: String,
    #[serde(default)]
    pub caller_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeQuery {
    #[serde(default)]
    pub caller: Option<String>,
}

pub struct HarvestServer {
    state: Arc<ServerState>,
}

impl HarvestServer {
    pub fn new(harvester: Arc<Harvester>, token: Option<String>) -> Self {
        Self {
            state: Arc::new(ServerState { harvester, token }),
        }
    }

    /// Build the router. `/health` bypasses the auth layer.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        Router::new()
            .route("/scrape", post(handle_scrape))
            .route("/stats", get(handle_stats))
            .route("/probe", get(handle_probe))
            .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
            .route("/health", get(handle_health))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve on `addr` until `shutdown` resolves.
    pub async fn run<F>(&self, addr: &str, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP server listening on {addr}");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}

/// Auth middleware: checks the Bearer token if one is configured.
async fn auth_layer(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    if let Some(expected) = &state.token {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    }

    next.run(request).await
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, AxumJson(serde_json::json!({ "message": message }))).into_response()
}

/// Caller address: explicit body value, then the first `X-Forwarded-For`
/// hop, then the peer socket address.
fn caller_address(
    explicit: Option<&str>,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> String {
    if let Some(addr) = explicit.map(str::trim).filter(|a| !a.is_empty()) {
        return addr.to_string();
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());
    if let Some(hop) = forwarded {
        return hop.to_string();
    }

    peer.map(|p| p.ip().to_string()).unwrap_or_default()
}

async fn handle_scrape(
    State(state): State<Arc<ServerState>>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    AxumJson(body): AxumJson<ScrapeRequest>,
) -> Response {
    let target = body.target.trim();
    if target.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "target is required");
    }

    let caller = caller_address(
        body.caller_address.as_deref(),
        &headers,
        connect.map(|ConnectInfo(addr)| addr),
    );
    let user_agent = body.user_agent.as_deref().or_else(|| {
        headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
    });

    match state
        .harvester
        .scrape_profile(target, &caller, user_agent)
        .await
    {
        Ok(result) => AxumJson(result).into_response(),
        Err(failure) => {
            let status = match failure.error {
                ErrorKind::NoIdentityAvailable => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            };
            (status, AxumJson(failure)).into_response()
        }
    }
}

async fn handle_stats(State(state): State<Arc<ServerState>>) -> Response {
    AxumJson(state.harvester.pool_stats().await).into_response()
}

async fn handle_probe(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ProbeQuery>,
) -> Response {
    AxumJson(state.harvester.probe(query.caller.as_deref()).await).into_response()
}

/// Health check endpoint. Never requires auth.
async fn handle_health() -> AxumJson<serde_json::Value> {
    AxumJson(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
