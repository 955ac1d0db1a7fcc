//! HTTP route handlers for the mission API.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, put};
use planner::core::types::{Mission, MissionDescriptor};
use planner::io::ideas::{Idea, IdeaNotFoundError};
use planner::io::store::{MissionNotFoundError, validate_mission_id};
use planner::submit::{EmptyGoalError, prepare_mission};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/missions", get(list_missions).post(create_mission))
        .route("/missions/{id}", get(get_mission).delete(delete_mission))
        .route("/ideas", get(list_ideas).post(create_idea))
        .route("/ideas/{id}", put(update_idea).delete(delete_idea))
}

#[derive(Debug, Default, Deserialize)]
struct GoalBody {
    goal: Option<String>,
}

/// Lenient body parsing: anything that is not `{"goal": "..."}` has no goal.
fn goal_from_body(body: &Bytes) -> Option<String> {
    serde_json::from_slice::<GoalBody>(body)
        .ok()
        .and_then(|parsed| parsed.goal)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn internal(err: &anyhow::Error) -> Response {
    error!(error = %format!("{err:#}"), "request failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "reasoner_available": state.runner.reasoner_available(),
    }))
}

/// POST /api/missions - submit a goal; the mission runs in the background.
async fn create_mission(State(state): State<AppState>, body: Bytes) -> Response {
    let goal = goal_from_body(&body);
    let mission = match prepare_mission(goal.as_deref(), state.runner.store().as_ref()) {
        Ok(mission) => mission,
        Err(err) if err.downcast_ref::<EmptyGoalError>().is_some() => {
            return error_body(StatusCode::BAD_REQUEST, err.to_string());
        }
        Err(err) => return internal(&err),
    };
    let descriptor = mission.descriptor();
    info!(mission_id = %mission.id, "scheduling mission");
    let runner = state.runner.clone();
    tokio::task::spawn_blocking(move || runner.run(mission));
    (StatusCode::ACCEPTED, Json(descriptor)).into_response()
}

/// GET /api/missions - newest first.
async fn list_missions(
    State(state): State<AppState>,
) -> Result<Json<Vec<MissionDescriptor>>, Response> {
    state
        .runner
        .store()
        .list()
        .map(Json)
        .map_err(|err| internal(&err))
}

/// GET /api/missions/{id} - full mission record.
async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Mission>, Response> {
    if validate_mission_id(&id).is_err() {
        return Err(StatusCode::NOT_FOUND.into_response());
    }
    state
        .runner
        .store()
        .get(&id)
        .map(Json)
        .map_err(|err| mission_error(&err))
}

async fn delete_mission(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if validate_mission_id(&id).is_err() {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state.runner.store().delete(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => mission_error(&err),
    }
}

fn mission_error(err: &anyhow::Error) -> Response {
    if let Some(missing) = err.downcast_ref::<MissionNotFoundError>() {
        return error_body(StatusCode::NOT_FOUND, missing.to_string());
    }
    internal(err)
}

/// GET /api/ideas - newest first.
async fn list_ideas(State(state): State<AppState>) -> Result<Json<Vec<Idea>>, Response> {
    state.ideas.list().map(Json).map_err(|err| internal(&err))
}

/// POST /api/ideas - saving an existing goal returns the saved idea.
async fn create_idea(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(goal) = goal_from_body(&body).filter(|goal| !goal.trim().is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, EmptyGoalError.to_string());
    };
    match state.ideas.create(&goal) {
        Ok(idea) => (StatusCode::CREATED, Json(idea)).into_response(),
        Err(err) => internal(&err),
    }
}

async fn update_idea(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    body: Bytes,
) -> Response {
    let Some(goal) = goal_from_body(&body).filter(|goal| !goal.trim().is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, EmptyGoalError.to_string());
    };
    match state.ideas.update(id, &goal) {
        Ok(idea) => Json(idea).into_response(),
        Err(err) => idea_error(&err),
    }
}

async fn delete_idea(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match state.ideas.delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => idea_error(&err),
    }
}

fn idea_error(err: &anyhow::Error) -> Response {
    if let Some(missing) = err.downcast_ref::<IdeaNotFoundError>() {
        return error_body(StatusCode::NOT_FOUND, missing.to_string());
    }
    internal(err)
}
