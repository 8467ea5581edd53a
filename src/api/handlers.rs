//! Request handlers.
//!
//! Each handler validates its input, calls the engine or a store, and wraps
//! the result in the `{"data": ...}` envelope.

use super::error::ApiErr;
use super::AppState;
use crate::error::AppError;
use crate::models::{PullRequest, PullRequestShort, Team, User};
use crate::services::{membership, Reassignment};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Envelopes ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Envelope<T> {
    data: T,
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(Envelope { data })).into_response()
}

#[derive(Serialize)]
struct TeamBody {
    team: Team,
}

#[derive(Serialize)]
struct UserBody {
    user: User,
}

#[derive(Serialize)]
struct PrBody {
    pr: PullRequest,
}

#[derive(Serialize)]
struct ReviewsBody {
    user_id: String,
    pull_requests: Vec<PullRequestShort>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

// ── Inputs ───────────────────────────────────────────────────────────────────

/// Body of `POST /users/setIsActive`.
#[derive(Debug, Deserialize)]
pub struct SetActiveInput {
    pub user_id: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Body of `POST /pullRequest/create`.
#[derive(Debug, Deserialize)]
pub struct CreatePrInput {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

/// Body of `POST /pullRequest/merge`.
#[derive(Debug, Deserialize)]
pub struct MergeInput {
    pub pull_request_id: String,
}

/// Body of `POST /pullRequest/reassign`.
#[derive(Debug, Deserialize)]
pub struct ReassignInput {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub team_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Reject empty or whitespace-only identifiers.
fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            format!("{} is required", field),
            field,
        ));
    }
    Ok(value)
}

fn require_param<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
    require(value.as_deref().unwrap_or_default(), field)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

/// POST /team/add — create a team and upsert its members.
pub async fn create_team(
    State(state): State<AppState>,
    payload: Result<Json<Team>, JsonRejection>,
) -> Result<Response, ApiErr> {
    let Json(team) = payload?;
    require(&team.team_name, "team_name")?;

    let team = membership::create_team(state.engine.coordinator(), &team).await?;
    Ok(success(StatusCode::CREATED, TeamBody { team }))
}

/// GET /team/get?team_name=X
pub async fn get_team(
    State(state): State<AppState>,
    query: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Response, ApiErr> {
    let Query(query) = query?;
    let team_name = require_param(&query.team_name, "team_name")?;

    let team = membership::get_team(state.engine.pool(), team_name).await?;
    log::debug!("[api] team {} retrieved", team_name);
    Ok(success(StatusCode::OK, team))
}

/// POST /users/setIsActive
pub async fn set_user_active(
    State(state): State<AppState>,
    payload: Result<Json<SetActiveInput>, JsonRejection>,
) -> Result<Response, ApiErr> {
    let Json(input) = payload?;
    let user_id = require(&input.user_id, "user_id")?;

    let user = membership::set_user_active(state.engine.pool(), user_id, input.is_active).await?;
    Ok(success(StatusCode::OK, UserBody { user }))
}

/// GET /users/getReview?user_id=X — pull requests the user reviews.
pub async fn get_user_reviews(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Response, ApiErr> {
    let Query(query) = query?;
    let user_id = require_param(&query.user_id, "user_id")?;

    let reviews = state.engine.user_reviews(user_id).await?;
    log::debug!("[api] {} reviews for {}", reviews.len(), user_id);

    Ok(success(
        StatusCode::OK,
        ReviewsBody {
            user_id: user_id.to_string(),
            pull_requests: reviews.iter().map(PullRequest::to_short).collect(),
        },
    ))
}

/// POST /pullRequest/create — create a PR and assign reviewers.
pub async fn create_pr(
    State(state): State<AppState>,
    payload: Result<Json<CreatePrInput>, JsonRejection>,
) -> Result<Response, ApiErr> {
    let Json(input) = payload?;
    let pr_id = require(&input.pull_request_id, "pull_request_id")?;
    let name = require(&input.pull_request_name, "pull_request_name")?;
    let author_id = require(&input.author_id, "author_id")?;

    let pr = state.engine.create_pr(pr_id, name, author_id).await?;
    Ok(success(StatusCode::CREATED, PrBody { pr }))
}

/// POST /pullRequest/merge — idempotent merge.
pub async fn merge_pr(
    State(state): State<AppState>,
    payload: Result<Json<MergeInput>, JsonRejection>,
) -> Result<Response, ApiErr> {
    let Json(input) = payload?;
    let pr_id = require(&input.pull_request_id, "pull_request_id")?;

    let pr = state.engine.merge_pr(pr_id).await?;
    Ok(success(StatusCode::OK, PrBody { pr }))
}

/// POST /pullRequest/reassign — replace one reviewer.
pub async fn reassign_reviewer(
    State(state): State<AppState>,
    payload: Result<Json<ReassignInput>, JsonRejection>,
) -> Result<Response, ApiErr> {
    let Json(input) = payload?;
    let pr_id = require(&input.pull_request_id, "pull_request_id")?;
    let old_reviewer_id = require(&input.old_reviewer_id, "old_reviewer_id")?;

    let reassignment: Reassignment = state
        .engine
        .reassign_reviewer(pr_id, old_reviewer_id)
        .await?;
    Ok(success(StatusCode::OK, reassignment))
}
