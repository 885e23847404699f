//! Request workflow routes: public submission, admin review.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AdminUser;
use crate::services::request::{self, ApprovalOutcome, NewRequest, Request, RequestFilter};
use crate::state::AppState;

/// `GET /api/requests`: newest first, optionally `?status=pending`.
pub async fn list_requests(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<Request>>, ApiError> {
    Ok(Json(request::list_requests(&state.pool, &filter).await?))
}

/// `POST /api/requests`: a student asks to join or found a team.
pub async fn submit_request(
    State(state): State<AppState>,
    Json(body): Json<NewRequest>,
) -> Result<(StatusCode, Json<Request>), ApiError> {
    let created = request::submit_request(&state.pool, state.max_team_members(), &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /api/requests/:id/approve`
pub async fn approve_request(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ApprovalOutcome>, ApiError> {
    Ok(Json(request::approve_request(&state.pool, state.max_team_members(), request_id).await?))
}

/// `POST /api/requests/:id/deny`
pub async fn deny_request(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(request_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    request::deny_request(&state.pool, request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
