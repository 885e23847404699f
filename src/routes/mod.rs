//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every endpoint lives under `/api` except `/healthz`. Admin-only handlers
//! take an `AdminUser` extractor, so authorization is visible in each
//! handler's signature rather than in a routing layer.

pub mod admin;
pub mod auth;
pub mod requests;
pub mod students;
pub mod teams;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full HTTP surface.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/is-admin", get(auth::is_admin))
        .route(
            "/api/students",
            get(students::list_students).post(students::create_student),
        )
        .route("/api/students/register", post(students::register_student))
        .route(
            "/api/students/{id}",
            get(students::get_student)
                .patch(students::update_student)
                .delete(students::delete_student),
        )
        .route("/api/students/{id}/dashboard", get(students::dashboard))
        .route(
            "/api/students/{id}/metrics",
            get(students::get_metrics).put(students::set_metrics),
        )
        .route("/api/students/{id}/metrics/history", get(students::metric_history))
        .route(
            "/api/students/{id}/reflections",
            get(students::list_reflections).post(students::add_reflection),
        )
        .route(
            "/api/students/{id}/action-plans",
            get(students::list_action_plans).post(students::create_action_plan),
        )
        .route("/api/action-plans/{id}/toggle", post(students::toggle_action_plan))
        .route("/api/action-plans/{id}", patch(students::set_action_plan_status))
        .route("/api/teams", get(teams::list_teams))
        .route(
            "/api/teams/{id}",
            get(teams::get_team)
                .patch(teams::update_team)
                .delete(teams::delete_team),
        )
        .route("/api/teams/{id}/leader", put(teams::change_leader))
        .route(
            "/api/teams/{id}/members/{student_id}",
            patch(teams::update_member).delete(teams::remove_member),
        )
        .route(
            "/api/requests",
            get(requests::list_requests).post(requests::submit_request),
        )
        .route("/api/requests/{id}/approve", post(requests::approve_request))
        .route("/api/requests/{id}/deny", post(requests::deny_request))
        .route("/api/admin/duplicates", get(admin::preview_duplicates))
        .route("/api/admin/duplicates/merge", post(admin::merge_duplicates))
        .route("/api/admin/analytics", get(admin::analytics))
        .route("/api/admin/export.json", get(admin::export_json))
        .route("/api/admin/export.csv", get(admin::export_csv))
        .route("/healthz", get(healthz))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
