//! Student routes: roster, self-registration, dashboard, metrics, journal.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AdminUser;
use crate::services::journal::{self, ActionPlan, ActionPlanStatusUpdate, NewActionPlan, NewReflection, Reflection};
use crate::services::metrics::{self, MetricSnapshot, SkillMetrics, StudentMetrics};
use crate::services::student::{self, Membership, Student, StudentFilter, StudentInput, StudentPatch};
use crate::services::team::{self, TeamSummary};
use crate::state::AppState;

/// Reflections shown on the dashboard.
const DASHBOARD_REFLECTIONS: i64 = 10;

#[derive(Serialize)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub team: Option<Membership>,
}

#[derive(Serialize)]
pub struct Dashboard {
    pub student: Student,
    pub membership: Option<Membership>,
    pub team: Option<TeamSummary>,
    pub metrics: Option<StudentMetrics>,
    pub metric_history: Vec<MetricSnapshot>,
    pub reflections: Vec<Reflection>,
    pub action_plans: Vec<ActionPlan>,
}

#[derive(Deserialize)]
pub struct ReflectionQuery {
    pub limit: Option<i64>,
}

// =============================================================================
// ROSTER
// =============================================================================

/// `GET /api/students`
pub async fn list_students(
    State(state): State<AppState>,
    Query(filter): Query<StudentFilter>,
) -> Result<Json<Vec<Student>>, ApiError> {
    Ok(Json(student::list_students(&state.pool, &filter).await?))
}

/// `POST /api/students`: admin creates a student, `active` by default.
pub async fn create_student(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<StudentInput>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let created = student::create_student(&state.pool, &state.config.university_email_domain, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /api/students/register`: public self-registration, always `free`.
pub async fn register_student(
    State(state): State<AppState>,
    Json(body): Json<StudentInput>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let created = student::register_student(&state.pool, &state.config.university_email_domain, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/students/:id`: student plus current team.
pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentDetail>, ApiError> {
    let student = student::get_student(&state.pool, student_id).await?;
    let team = student::get_membership(&state.pool, student_id).await?;
    Ok(Json(StudentDetail { student, team }))
}

/// `PATCH /api/students/:id`
pub async fn update_student(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(student_id): Path<Uuid>,
    Json(body): Json<StudentPatch>,
) -> Result<Json<Student>, ApiError> {
    let updated =
        student::update_student(&state.pool, &state.config.university_email_domain, student_id, &body).await?;
    Ok(Json(updated))
}

/// `DELETE /api/students/:id`
pub async fn delete_student(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(student_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    student::delete_student(&state.pool, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/students/:id/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Dashboard>, ApiError> {
    let student = student::get_student(&state.pool, student_id).await?;
    let membership = student::get_membership(&state.pool, student_id).await?;
    let team = match &membership {
        Some(m) => Some(team::get_team(&state.pool, m.team_id, state.max_team_members()).await?),
        None => None,
    };

    Ok(Json(Dashboard {
        student,
        membership,
        team,
        metrics: metrics::get_metrics(&state.pool, student_id).await?,
        metric_history: metrics::metric_history(&state.pool, student_id).await?,
        reflections: journal::list_reflections(&state.pool, student_id, DASHBOARD_REFLECTIONS).await?,
        action_plans: journal::list_action_plans(&state.pool, student_id).await?,
    }))
}

// =============================================================================
// METRICS
// =============================================================================

/// `GET /api/students/:id/metrics`: `null` until scores are recorded.
pub async fn get_metrics(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Option<StudentMetrics>>, ApiError> {
    Ok(Json(metrics::get_metrics(&state.pool, student_id).await?))
}

/// `PUT /api/students/:id/metrics`
pub async fn set_metrics(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(student_id): Path<Uuid>,
    Json(body): Json<SkillMetrics>,
) -> Result<Json<StudentMetrics>, ApiError> {
    Ok(Json(metrics::set_metrics(&state.pool, student_id, &body).await?))
}

/// `GET /api/students/:id/metrics/history`
pub async fn metric_history(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<MetricSnapshot>>, ApiError> {
    Ok(Json(metrics::metric_history(&state.pool, student_id).await?))
}

// =============================================================================
// JOURNAL
// =============================================================================

/// `GET /api/students/:id/reflections?limit=N`
pub async fn list_reflections(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Query(query): Query<ReflectionQuery>,
) -> Result<Json<Vec<Reflection>>, ApiError> {
    let limit = journal::reflection_limit(query.limit);
    Ok(Json(journal::list_reflections(&state.pool, student_id, limit).await?))
}

/// `POST /api/students/:id/reflections`
pub async fn add_reflection(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Json(body): Json<NewReflection>,
) -> Result<(StatusCode, Json<Reflection>), ApiError> {
    let reflection = journal::add_reflection(&state.pool, student_id, &body).await?;
    Ok((StatusCode::CREATED, Json(reflection)))
}

/// `GET /api/students/:id/action-plans`
pub async fn list_action_plans(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<ActionPlan>>, ApiError> {
    Ok(Json(journal::list_action_plans(&state.pool, student_id).await?))
}

/// `POST /api/students/:id/action-plans`
pub async fn create_action_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(student_id): Path<Uuid>,
    Json(body): Json<NewActionPlan>,
) -> Result<(StatusCode, Json<ActionPlan>), ApiError> {
    let plan = journal::create_action_plan(&state.pool, student_id, &body).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

/// `POST /api/action-plans/:id/toggle`
pub async fn toggle_action_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<ActionPlan>, ApiError> {
    Ok(Json(journal::toggle_action_plan(&state.pool, plan_id).await?))
}

/// `PATCH /api/action-plans/:id`
pub async fn set_action_plan_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<ActionPlanStatusUpdate>,
) -> Result<Json<ActionPlan>, ApiError> {
    Ok(Json(journal::set_action_plan_status(&state.pool, plan_id, body.status).await?))
}
