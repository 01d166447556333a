use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use lanegraph_core::Error as CoreError;
use lanegraph_core::model::{Bounds, Node, Segment};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::{AppState, ZoneEvent};

const DANGER_ZONE_MESSAGE: &str =
    "You are entering a high-accident zone. Slow down and watch for other traffic.";

pub fn build_router(state: Arc<AppState>, max_concurrent_requests: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/interact", put(interact))
        .route("/nodes/in-bounds", get(nodes_in_bounds))
        .route("/lines/connected-to-nodes-in-bounds", get(lines_in_bounds))
        .route("/lines/{id}/connected", get(lines_connected))
        .route("/lines", get(all_lines))
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = match err {
            CoreError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!("Query failed: {err}");
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

#[derive(Serialize)]
struct NodesResponse {
    message: String,
    count: usize,
    nodes: Vec<Node>,
}

#[derive(Serialize)]
struct LinesResponse {
    message: String,
    count: usize,
    lines: Vec<Segment>,
}

/// Raw bounds parameters; validated by hand so errors stay JSON.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundsQuery {
    lat_min: Option<String>,
    lat_max: Option<String>,
    lng_min: Option<String>,
    lng_max: Option<String>,
}

impl BoundsQuery {
    fn bounds(&self) -> Result<Bounds, ApiError> {
        let (Some(lat_min), Some(lat_max), Some(lng_min), Some(lng_max)) =
            (&self.lat_min, &self.lat_max, &self.lng_min, &self.lng_max)
        else {
            return Err(ApiError::bad_request(
                "Missing required query parameters: latMin, latMax, lngMin, lngMax",
            ));
        };

        let parse = |name: &str, value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| ApiError::bad_request(format!("Invalid value for {name}: {value}")))
        };
        Ok(Bounds::new(
            parse("latMin", lat_min)?,
            parse("latMax", lat_max)?,
            parse("lngMin", lng_min)?,
            parse("lngMax", lng_max)?,
        ))
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "message": "Hello, World! Database is ready." }))
}

async fn nodes_in_bounds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoundsQuery>,
) -> Result<Json<NodesResponse>, ApiError> {
    let bounds = query.bounds()?;
    let nodes = state.store.find_nodes_in_bounds(&bounds)?;
    Ok(Json(NodesResponse {
        message: format!("Found {} nodes.", nodes.len()),
        count: nodes.len(),
        nodes,
    }))
}

async fn lines_in_bounds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoundsQuery>,
) -> Result<Json<LinesResponse>, ApiError> {
    let bounds = query.bounds()?;
    let lines = state.store.find_segments_touching_nodes_in_bounds(&bounds)?;
    Ok(Json(LinesResponse {
        message: format!(
            "Found {} lines connected to nodes in the specified bounds.",
            lines.len()
        ),
        count: lines.len(),
        lines,
    }))
}

async fn lines_connected(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: u32 = id
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid line ID provided."))?;

    let lines = state.store.find_segments_adjacent_to(id)?;
    if lines.is_empty() {
        let body = LinesResponse {
            message: format!("Line with ID {id} not found."),
            count: 0,
            lines,
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    }

    Ok(Json(LinesResponse {
        message: format!(
            "Found {} lines connected to the nodes of line {id}.",
            lines.len()
        ),
        count: lines.len(),
        lines,
    })
    .into_response())
}

async fn all_lines(State(state): State<Arc<AppState>>) -> Result<Json<LinesResponse>, ApiError> {
    let lines = state.store.all_road_segments()?;
    Ok(Json(LinesResponse {
        message: format!("Found {} lines in total.", lines.len()),
        count: lines.len(),
        lines,
    }))
}

#[derive(Debug, Deserialize)]
struct InteractRequest {
    lng: Option<f64>,
    lat: Option<f64>,
}

async fn interact(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InteractRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let lng = req
        .lng
        .ok_or_else(|| ApiError::bad_request("Missing required parameter: lng"))?;
    let lat = req
        .lat
        .ok_or_else(|| ApiError::bad_request("Missing required parameter: lat"))?;

    let Some(grid) = &state.density else {
        return Err(ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "No accident density grid loaded".to_string(),
        });
    };

    let dangerous = grid.is_dangerous(lng, lat);
    tracing::debug!("Position ({lng}, {lat}) in danger zone: {dangerous}");

    let event = {
        let mut zone = state.zone.lock().map_err(|_| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Danger zone state is unavailable".to_string(),
        })?;
        zone.update(dangerous)
    };

    let body = match event {
        ZoneEvent::Entered => json!({ "type": "car", "message": DANGER_ZONE_MESSAGE }),
        ZoneEvent::Inside | ZoneEvent::Outside => json!({}),
    };
    Ok(Json(body).into_response())
}
