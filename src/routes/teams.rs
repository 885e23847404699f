//! Team routes: browse teams, admin edits, leadership and membership changes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AdminUser;
use crate::services::team::{self, TeamFilter, TeamPatch, TeamSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LeaderBody {
    pub student_id: Uuid,
}

#[derive(Deserialize)]
pub struct MemberRoleBody {
    pub role: String,
}

/// `GET /api/teams`: active teams unless `?status=` says otherwise.
pub async fn list_teams(
    State(state): State<AppState>,
    Query(filter): Query<TeamFilter>,
) -> Result<Json<Vec<TeamSummary>>, ApiError> {
    Ok(Json(team::list_teams(&state.pool, &filter, state.max_team_members()).await?))
}

/// `GET /api/teams/:id`
pub async fn get_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TeamSummary>, ApiError> {
    Ok(Json(team::get_team(&state.pool, team_id, state.max_team_members()).await?))
}

/// `PATCH /api/teams/:id`
pub async fn update_team(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(team_id): Path<Uuid>,
    Json(body): Json<TeamPatch>,
) -> Result<Json<TeamSummary>, ApiError> {
    team::update_team(&state.pool, team_id, &body).await?;
    Ok(Json(team::get_team(&state.pool, team_id, state.max_team_members()).await?))
}

/// `DELETE /api/teams/:id`: members go back to `free`.
pub async fn delete_team(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(team_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    team::delete_team(&state.pool, team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /api/teams/:id/leader`
pub async fn change_leader(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(team_id): Path<Uuid>,
    Json(body): Json<LeaderBody>,
) -> Result<Json<TeamSummary>, ApiError> {
    team::change_leader(&state.pool, team_id, body.student_id).await?;
    Ok(Json(team::get_team(&state.pool, team_id, state.max_team_members()).await?))
}

/// `PATCH /api/teams/:id/members/:student_id`
pub async fn update_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((team_id, student_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<MemberRoleBody>,
) -> Result<StatusCode, ApiError> {
    team::update_member_role(&state.pool, team_id, student_id, &body.role).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/teams/:id/members/:student_id`
pub async fn remove_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((team_id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    team::remove_member(&state.pool, team_id, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
