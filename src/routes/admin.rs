//! Admin routes: duplicate reconciliation, analytics, cohort export.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::auth::AdminUser;
use crate::services::analytics::{self, Analytics};
use crate::services::export;
use crate::services::reconcile::{self, DuplicateGroup, MergeReport};
use crate::state::AppState;

#[derive(Serialize)]
pub struct DuplicatePreview {
    pub duplicates_found: usize,
    pub groups: Vec<DuplicateGroup>,
}

/// `GET /api/admin/duplicates`: dry run, nothing is changed.
pub async fn preview_duplicates(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<DuplicatePreview>, ApiError> {
    let groups = reconcile::preview_duplicates(&state.pool).await?;
    Ok(Json(DuplicatePreview { duplicates_found: reconcile::count_duplicates(&groups), groups }))
}

/// `POST /api/admin/duplicates/merge`
pub async fn merge_duplicates(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<MergeReport>, ApiError> {
    let report = reconcile::merge_duplicates(&state.pool).await?;
    tracing::info!(
        admin = %admin.user.id,
        found = report.duplicates_found,
        removed = report.duplicates_removed,
        failed_groups = report.groups_failed,
        "duplicate merge finished"
    );
    Ok(Json(report))
}

/// `GET /api/admin/analytics`
pub async fn analytics(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Analytics>, ApiError> {
    Ok(Json(analytics::load_analytics(&state.pool).await?))
}

/// `GET /api/admin/export.json`
pub async fn export_json(State(state): State<AppState>, _admin: AdminUser) -> Result<Response, ApiError> {
    let students = export::load_export(&state.pool).await?;
    let chunks = export::json_chunks(&students)?;
    Ok(download(chunks, "application/json; charset=utf-8", &today_filename("json")))
}

/// `GET /api/admin/export.csv`
pub async fn export_csv(State(state): State<AppState>, _admin: AdminUser) -> Result<Response, ApiError> {
    let students = export::load_export(&state.pool).await?;
    let chunks = export::csv_chunks(&students)?;
    Ok(download(chunks, "text/csv; charset=utf-8", &today_filename("csv")))
}

fn today_filename(extension: &str) -> String {
    export::export_filename(time::OffsetDateTime::now_utc().date(), extension)
}

/// Stream pre-rendered chunks as an attachment.
fn download(chunks: Vec<String>, content_type: &'static str, filename: &str) -> Response {
    let stream = futures::stream::iter(
        chunks
            .into_iter()
            .map(|chunk| Ok::<Bytes, std::convert::Infallible>(Bytes::from(chunk))),
    );
    let body = Body::from_stream(stream);

    (
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, &format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
