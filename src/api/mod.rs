//! JSON HTTP API for the graph engine.
//!
//! Exposes the catalog, one-shot traversals, and a per-server traversal
//! session. Payloads are plain `{nodes, edges}` shapes a rendering client
//! can feed straight into a network widget.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::catalog::SharedCatalog;
use crate::config::Config;
use crate::error::GraphError;
use crate::graph::filter::{self, EntityQuery};
use crate::graph::session::TraversalSession;
use crate::graph::store::GraphBackend;
use crate::graph::traversal::TraversalEngine;
use crate::types::{Direction, EntityId, EntityState, StopConditions};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct ApiState {
    backend: Mutex<GraphBackend>,
    catalog: SharedCatalog,
    session: Mutex<TraversalSession>,
    state_colors: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EntitiesQuery {
    q: Option<String>,
    state: Option<String>,
    category: Option<i64>,
    application: Option<bool>,
}

#[derive(Deserialize)]
struct TraverseRequest {
    seeds: Vec<EntityId>,
    #[serde(default)]
    options: StopConditions,
}

#[derive(Deserialize)]
struct SelectRequest {
    id: EntityId,
}

#[derive(Deserialize)]
struct SessionOptionsRequest {
    direction: Option<Direction>,
    options: Option<StopConditions>,
}

#[derive(Serialize)]
struct MergeResponse {
    new_nodes: usize,
    new_edges: usize,
}

#[derive(Serialize)]
struct StatsResponse {
    entities: usize,
    relations: usize,
    session_nodes: usize,
    session_edges: usize,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn error_response(err: GraphError) -> Response {
    let status = match &err {
        GraphError::InvalidSeed(_) | GraphError::Config(_) => StatusCode::BAD_REQUEST,
        GraphError::NotFound(_) => StatusCode::NOT_FOUND,
        GraphError::Fetch(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_entities(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<EntitiesQuery>,
) -> Response {
    let catalog = match state.catalog.get() {
        Ok(c) => c,
        Err(err) => return error_response(err),
    };

    let query = EntityQuery {
        text: params.q.unwrap_or_default(),
        state_include: params
            .state
            .as_deref()
            .and_then(EntityState::from_str_loose)
            .map(|s| [s].into_iter().collect()),
        category_include: params.category.map(|c| [c].into_iter().collect()),
        application_only: params.application,
    };

    let hits: Vec<_> = filter::apply(catalog.entities(), &query)
        .into_iter()
        .cloned()
        .collect();
    Json(hits).into_response()
}

async fn refresh_catalog(State(state): State<Arc<ApiState>>) -> Response {
    let backend = state.backend.lock().await;
    match state.catalog.refresh(&*backend) {
        Ok(catalog) => Json(serde_json::json!({ "entities": catalog.len() })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn run_traversal(
    state: Arc<ApiState>,
    req: TraverseRequest,
    direction: Direction,
) -> Response {
    let catalog = match state.catalog.get() {
        Ok(c) => c,
        Err(err) => return error_response(err),
    };
    let backend = state.backend.lock().await;

    let engine = TraversalEngine::new(&catalog, &*backend);
    match engine.traverse(&req.seeds, direction, &req.options) {
        Ok(result) => Json(result).into_response(),
        Err(err) => error_response(err),
    }
}

async fn traverse_forward(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<TraverseRequest>,
) -> Response {
    run_traversal(state, req, Direction::Forward).await
}

async fn traverse_reverse(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<TraverseRequest>,
) -> Response {
    run_traversal(state, req, Direction::Reverse).await
}

async fn session_select(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SelectRequest>,
) -> Response {
    let catalog = match state.catalog.get() {
        Ok(c) => c,
        Err(err) => return error_response(err),
    };
    let backend = state.backend.lock().await;
    let mut session = state.session.lock().await;

    match session.select(req.id, &catalog, &*backend) {
        Ok((new_nodes, new_edges)) => Json(MergeResponse {
            new_nodes,
            new_edges,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn session_remove(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SelectRequest>,
) -> Response {
    let mut session = state.session.lock().await;
    session.remove(req.id);
    Json(session.snapshot()).into_response()
}

async fn session_clear(State(state): State<Arc<ApiState>>) -> Response {
    let mut session = state.session.lock().await;
    session.clear();
    StatusCode::NO_CONTENT.into_response()
}

async fn session_snapshot(State(state): State<Arc<ApiState>>) -> Response {
    let session = state.session.lock().await;
    Json(session.snapshot()).into_response()
}

async fn session_options(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SessionOptionsRequest>,
) -> Response {
    let mut session = state.session.lock().await;
    if let Some(direction) = req.direction {
        session.set_direction(direction);
    }
    if let Some(options) = req.options {
        session.set_options(options);
    }
    Json(serde_json::json!({
        "direction": session.direction(),
        "options": session.options(),
    }))
    .into_response()
}

async fn get_stats(State(state): State<Arc<ApiState>>) -> Response {
    let backend = state.backend.lock().await;
    let session = state.session.lock().await;

    match backend.stats() {
        Ok(stats) => Json(StatsResponse {
            entities: stats.entities,
            relations: stats.relations,
            session_nodes: session.graph().node_count(),
            session_edges: session.graph().edge_count(),
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_colors(State(state): State<Arc<ApiState>>) -> Json<BTreeMap<String, String>> {
    Json(state.state_colors.clone())
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Build the API Router (extracted for testability).
fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/entities", get(get_entities))
        .route("/api/catalog/refresh", post(refresh_catalog))
        .route("/api/graph/forward", post(traverse_forward))
        .route("/api/graph/reverse", post(traverse_reverse))
        .route("/api/session/select", post(session_select))
        .route("/api/session/remove", post(session_remove))
        .route("/api/session/clear", post(session_clear))
        .route("/api/session/snapshot", get(session_snapshot))
        .route("/api/session/options", post(session_options))
        .route("/api/stats", get(get_stats))
        .route("/api/colors", get(get_colors))
        .with_state(state)
}

/// Start the API server.
///
/// Opens the backend database, loads the catalog once up front, and serves
/// until Ctrl-C.
pub async fn run_server(config: &Config, addr: SocketAddr) -> crate::error::Result<()> {
    let backend = GraphBackend::new(&config.database.path)?;

    let catalog = SharedCatalog::empty();
    catalog.refresh(&backend)?;

    let state = Arc::new(ApiState {
        backend: Mutex::new(backend),
        catalog,
        session: Mutex::new(TraversalSession::new(
            Direction::Forward,
            config.traversal.stop_conditions(),
        )),
        state_colors: config.display.state_colors.clone(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("modgraph API listening on http://{}", addr);
    eprintln!("modgraph API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down API server");
        })
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
