use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fleetnav_core::graph::NodeEta;
use fleetnav_core::{Bot, BotId, EdgeId, Location, MapEdge, MapNode, NodeId, PathRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, info_span, Instrument};

use crate::channel::session::ws_handler;
use crate::channel::{Delivery, Direction};
use crate::errors::AppError;
use crate::AppState;

type ApiResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct Healthz {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CreatePathRequest {
    pub path: Vec<Vec<f64>>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePathRequest {
    pub path_id: EdgeId,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNodeRequest {
    pub id: NodeId,
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct BetweenQuery {
    pub lat1: f64,
    pub lon1: f64,
    pub lat2: f64,
    pub lon2: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateBotRequest {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotIdParam {
    pub bot_id: BotId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToNodeRequest {
    pub bot_id: BotId,
    pub node_id: NodeId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocationRequest {
    pub bot_id: BotId,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceQueueRequest {
    pub bot_id: BotId,
    pub queue: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub identity: String,
    pub direction: String,
}

#[derive(Debug, Serialize)]
pub struct MoveResponse {
    pub identity: String,
    pub direction: Direction,
    pub delivery: Delivery,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route("/paths", get(list_paths).post(create_path).delete(delete_path))
        .route("/paths/nodes", get(list_nodes).delete(delete_node))
        .route("/paths/nodes/location", get(nodes_near))
        .route("/paths/between", get(path_between))
        .route("/bots", get(list_bots).post(create_bot).delete(delete_bot))
        .route("/bots/bot", get(get_bot))
        .route("/bots/location", get(bot_location).put(report_location))
        .route("/bots/path", get(bot_path))
        .route("/bots/queue", get(bot_queue).put(replace_queue))
        .route("/bots/closest", get(closest_bot))
        .route("/bots/to_node", post(to_node))
        .route("/control/move", post(control_move))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

fn coords(pairs: &[Vec<f64>]) -> ApiResult<Vec<Location>> {
    Ok(pairs.iter().map(|p| Location::from_pair(p)).collect::<Result<Vec<_>, _>>()?)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(Healthz { status: "ok" }))
}

async fn version() -> impl IntoResponse {
    let svc_version = env!("CARGO_PKG_VERSION");
    let core_version = fleetnav_core::version();
    (StatusCode::OK, Json(json!({"service_version": svc_version, "core_version": core_version})))
}

// ---- map ----

async fn list_paths(State(state): State<AppState>) -> ApiResult<Json<Vec<PathRecord>>> {
    Ok(Json(state.fleet.paths()?))
}

async fn create_path(
    State(state): State<AppState>,
    payload: Result<Json<CreatePathRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let _enter = info_span!("create_path", points = req.path.len()).entered();
    let polyline = coords(&req.path)?;
    let record = state.fleet.create_path(&polyline, req.start.as_deref(), req.end.as_deref())?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn delete_path(
    State(state): State<AppState>,
    payload: Result<Json<DeletePathRequest>, JsonRejection>,
) -> ApiResult<Json<MapEdge>> {
    let Json(req) = payload?;
    Ok(Json(state.fleet.delete_path(req.path_id)?))
}

async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<Vec<MapNode>>> {
    Ok(Json(state.fleet.nodes()?))
}

async fn delete_node(
    State(state): State<AppState>,
    payload: Result<Json<DeleteNodeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let (node, removed) = state.fleet.delete_node(req.id)?;
    Ok(Json(json!({"node": node, "numPaths": removed})))
}

async fn nodes_near(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<NodeEta>>> {
    let Query(q) = query?;
    Ok(Json(state.fleet.nodes_with_eta(Location::new(q.latitude, q.longitude))?))
}

async fn path_between(
    State(state): State<AppState>,
    query: Result<Query<BetweenQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Location>>> {
    let Query(q) = query?;
    let _enter = info_span!("path_between", lat1 = q.lat1, lon1 = q.lon1, lat2 = q.lat2, lon2 = q.lon2).entered();
    let points = state.fleet.route_between(Location::new(q.lat1, q.lon1), Location::new(q.lat2, q.lon2))?;
    info!(waypoints = points.len(), "route found");
    Ok(Json(points))
}

// ---- bots ----

async fn list_bots(State(state): State<AppState>) -> ApiResult<Json<Vec<Bot>>> {
    Ok(Json(state.fleet.bots()?))
}

async fn create_bot(
    State(state): State<AppState>,
    payload: Result<Json<CreateBotRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let location = Location::validated(req.latitude, req.longitude)?;
    let bot = state.fleet.create_bot(&req.name, location)?;
    Ok((StatusCode::CREATED, Json(bot)))
}

async fn delete_bot(
    State(state): State<AppState>,
    payload: Result<Json<BotIdParam>, JsonRejection>,
) -> ApiResult<Json<Bot>> {
    let Json(req) = payload?;
    let bot = state.fleet.delete_bot(req.bot_id).instrument(info_span!("delete_bot", bot_id = req.bot_id)).await?;
    Ok(Json(bot))
}

async fn get_bot(
    State(state): State<AppState>,
    query: Result<Query<BotIdParam>, QueryRejection>,
) -> ApiResult<Json<Bot>> {
    let Query(q) = query?;
    Ok(Json(state.fleet.bot(q.bot_id)?))
}

async fn bot_location(
    State(state): State<AppState>,
    query: Result<Query<BotIdParam>, QueryRejection>,
) -> ApiResult<Json<Location>> {
    let Query(q) = query?;
    Ok(Json(state.fleet.bot(q.bot_id)?.location))
}

async fn bot_path(
    State(state): State<AppState>,
    query: Result<Query<BotIdParam>, QueryRejection>,
) -> ApiResult<Json<Vec<Location>>> {
    let Query(q) = query?;
    Ok(Json(state.fleet.bot(q.bot_id)?.path))
}

async fn bot_queue(
    State(state): State<AppState>,
    query: Result<Query<BotIdParam>, QueryRejection>,
) -> ApiResult<Json<Vec<Location>>> {
    let Query(q) = query?;
    Ok(Json(state.fleet.bot(q.bot_id)?.queue))
}

async fn closest_bot(
    State(state): State<AppState>,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> ApiResult<Json<Bot>> {
    let Query(q) = query?;
    Ok(Json(state.fleet.closest_bot(Location::new(q.latitude, q.longitude))?))
}

async fn to_node(
    State(state): State<AppState>,
    payload: Result<Json<ToNodeRequest>, JsonRejection>,
) -> ApiResult<Json<Bot>> {
    let Json(req) = payload?;
    let span = info_span!("to_node", bot_id = req.bot_id, node_id = req.node_id);
    let bot = state.fleet.assign_destination(req.bot_id, req.node_id).instrument(span).await?;
    Ok(Json(bot))
}

async fn report_location(
    State(state): State<AppState>,
    payload: Result<Json<ReportLocationRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let location = Location::validated(req.latitude, req.longitude)?;
    let span = info_span!("report_location", bot_id = req.bot_id);
    let outcome = state.fleet.report_location(req.bot_id, location).instrument(span).await?;
    Ok(Json(json!({"message": outcome.describe(), "report": outcome})))
}

async fn replace_queue(
    State(state): State<AppState>,
    payload: Result<Json<ReplaceQueueRequest>, JsonRejection>,
) -> ApiResult<Json<Bot>> {
    let Json(req) = payload?;
    let queue = coords(&req.queue)?;
    let span = info_span!("replace_queue", bot_id = req.bot_id, len = queue.len());
    let bot = state.fleet.replace_queue(req.bot_id, queue).instrument(span).await?;
    Ok(Json(bot))
}

// ---- live channel ----

async fn control_move(
    State(state): State<AppState>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> ApiResult<Json<MoveResponse>> {
    let Json(req) = payload?;
    let direction: Direction = req.direction.parse()?;
    let delivery = state.channel.send_command(&req.identity, direction);
    Ok(Json(MoveResponse { identity: req.identity, direction, delivery }))
}
