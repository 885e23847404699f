//! Request service: submission and admin approval of join/create requests.
//!
//! ARCHITECTURE
//! ============
//! A request moves `pending → approved | denied` exactly once. Submission,
//! approval, and denial each run in one transaction: the request row (and,
//! for joins, the target team row) is locked with `FOR UPDATE` so two admins
//! acting on the same team serialize and the capacity check cannot overshoot.
//!
//! The approval rules live in [`plan_approval`], a pure function over the
//! locked request and a team snapshot. The async layer only loads inputs and
//! applies the returned [`ApprovalPlan`].

use std::collections::HashSet;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::student::{self, StudentStatus};
use crate::services::team::{self, LEADER_ROLE, MEMBER_ROLE, TeamStatus};
use crate::validation::{self, ValidationError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Join,
    Create,
}

impl RequestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Create => "create",
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "join" => Some(Self::Join),
            "create" => Some(Self::Create),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request not found: {0}")]
    NotFound(Uuid),
    #[error("request {id} is already {}", .status.as_str())]
    NotPending { id: Uuid, status: RequestStatus },
    #[error("student not found: {0}")]
    StudentNotFound(Uuid),
    #[error("student {0} is not available for a team")]
    StudentUnavailable(Uuid),
    #[error("student {0} already has a pending request")]
    AlreadyPending(Uuid),
    #[error("team not found: {0}")]
    TeamNotFound(Uuid),
    #[error("team {0} is not accepting members")]
    TeamInactive(Uuid),
    #[error("team {0} is full")]
    TeamFull(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for RequestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_REQUEST_NOT_FOUND",
            Self::NotPending { .. } => "E_REQUEST_NOT_PENDING",
            Self::StudentNotFound(_) => "E_STUDENT_NOT_FOUND",
            Self::StudentUnavailable(_) => "E_STUDENT_UNAVAILABLE",
            Self::AlreadyPending(_) => "E_ALREADY_PENDING",
            Self::TeamNotFound(_) => "E_TEAM_NOT_FOUND",
            Self::TeamInactive(_) => "E_TEAM_INACTIVE",
            Self::TeamFull(_) => "E_TEAM_FULL",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::StudentNotFound(_) | Self::TeamNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotPending { .. }
            | Self::StudentUnavailable(_)
            | Self::AlreadyPending(_)
            | Self::TeamInactive(_)
            | Self::TeamFull(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn db_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// Submission body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub student_id: Uuid,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub team_id: Option<Uuid>,
    pub team_name: Option<String>,
    pub message: Option<String>,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub selected_members: Vec<Uuid>,
}

/// A submission that passed form validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidRequest {
    Join { team_id: Uuid, message: String },
    Create { team_name: String, message: String, logo_url: Option<String>, selected_members: Vec<Uuid> },
}

/// Request as listed for admins.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub team_id: Option<Uuid>,
    pub team_name: Option<String>,
    pub message: Option<String>,
    pub logo_url: Option<String>,
    pub selected_members: Vec<Uuid>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
}

/// The fields approval decisions depend on.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub id: Uuid,
    pub student_id: Uuid,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub team_id: Option<Uuid>,
    pub team_name: Option<String>,
    pub logo_url: Option<String>,
    pub selected_members: Vec<Uuid>,
}

/// Target team state read under lock.
#[derive(Debug, Clone, Copy)]
pub struct TeamSnapshot {
    pub status: TeamStatus,
    pub member_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalPlan {
    CreateTeam { leader_id: Uuid, team_name: String, logo_url: Option<String>, members: Vec<Uuid> },
    JoinTeam { team_id: Uuid, student_id: Uuid },
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalOutcome {
    pub request_id: Uuid,
    pub team_id: Uuid,
}

// =============================================================================
// PURE RULES
// =============================================================================

/// Members a create request may pre-select: capacity minus the leader.
#[must_use]
pub fn max_selected_members(max_team_members: usize) -> usize {
    max_team_members.saturating_sub(1)
}

/// Read `selected_members` JSON. Non-UUID entries are skipped.
#[must_use]
pub fn parse_selected_members(value: Option<&serde_json::Value>) -> Vec<Uuid> {
    value
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .filter_map(|raw| Uuid::parse_str(raw).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Validate a submission form.
///
/// # Errors
///
/// Returns the first field that fails validation.
pub fn validate_new_request(input: &NewRequest, max_team_members: usize) -> Result<ValidRequest, ValidationError> {
    let message = validation::message(input.message.as_deref())?;
    match input.kind {
        RequestKind::Join => {
            let team_id = input
                .team_id
                .ok_or_else(|| ValidationError::new("team_id", "Please select a team"))?;
            Ok(ValidRequest::Join { team_id, message })
        }
        RequestKind::Create => {
            let team_name = validation::team_name(input.team_name.as_deref().unwrap_or_default())?;
            let logo_url = validation::optional_url("logo_url", input.logo_url.as_deref())?;
            let selected = &input.selected_members;
            let limit = max_selected_members(max_team_members);
            if selected.is_empty() {
                return Err(ValidationError::new("selected_members", "Please select at least one team member"));
            }
            if selected.len() > limit {
                return Err(ValidationError::new(
                    "selected_members",
                    format!("You can select up to {limit} team members"),
                ));
            }
            if selected.contains(&input.student_id) {
                return Err(ValidationError::new("selected_members", "You cannot select yourself as a team member"));
            }
            let mut seen = HashSet::new();
            if !selected.iter().all(|id| seen.insert(*id)) {
                return Err(ValidationError::new("selected_members", "Each team member can only be selected once"));
            }
            Ok(ValidRequest::Create { team_name, message, logo_url, selected_members: selected.clone() })
        }
    }
}

/// Decide what approving `request` does, given the locked target team.
///
/// # Errors
///
/// `NotPending` for already-decided requests, `TeamFull`/`TeamInactive` for
/// joins that no longer fit, `Validation` for requests missing their target.
pub fn plan_approval(
    request: &StoredRequest,
    team: Option<TeamSnapshot>,
    max_team_members: usize,
) -> Result<ApprovalPlan, RequestError> {
    if request.status != RequestStatus::Pending {
        return Err(RequestError::NotPending { id: request.id, status: request.status });
    }
    match request.kind {
        RequestKind::Create => {
            let team_name = request
                .team_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| ValidationError::new("team_name", "Team name is required"))?;
            let mut seen = HashSet::new();
            let members: Vec<Uuid> = request
                .selected_members
                .iter()
                .copied()
                .filter(|id| *id != request.student_id && seen.insert(*id))
                .collect();
            if members.len() + 1 > max_team_members {
                return Err(ValidationError::new(
                    "selected_members",
                    format!("A team can have at most {max_team_members} members"),
                )
                .into());
            }
            Ok(ApprovalPlan::CreateTeam {
                leader_id: request.student_id,
                team_name: team_name.to_owned(),
                logo_url: request.logo_url.clone(),
                members,
            })
        }
        RequestKind::Join => {
            let team_id = request
                .team_id
                .ok_or_else(|| ValidationError::new("team_id", "Join request has no target team"))?;
            let snapshot = team.ok_or(RequestError::TeamNotFound(team_id))?;
            if snapshot.status != TeamStatus::Active {
                return Err(RequestError::TeamInactive(team_id));
            }
            if snapshot.member_count >= max_team_members {
                return Err(RequestError::TeamFull(team_id));
            }
            Ok(ApprovalPlan::JoinTeam { team_id, student_id: request.student_id })
        }
    }
}

// =============================================================================
// READS
// =============================================================================

const REQUEST_VIEW_SQL: &str = r#"SELECT r.id, r.student_id, s.name AS student_name, r.type, r.status, r.team_id,
        COALESCE(r.team_name, t.name) AS team_name, r.message, r.logo_url, r.selected_members,
        to_char(r.created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    FROM requests r
    JOIN students s ON s.id = r.student_id
    LEFT JOIN teams t ON t.id = r.team_id"#;

fn parse_kind(raw: &str) -> RequestKind {
    RequestKind::from_str(raw).unwrap_or_else(|| {
        tracing::warn!(kind = %raw, "unknown request type in database");
        RequestKind::Join
    })
}

fn parse_status(raw: &str) -> RequestStatus {
    RequestStatus::from_str(raw).unwrap_or_else(|| {
        tracing::warn!(status = %raw, "unknown request status in database");
        RequestStatus::Denied
    })
}

fn request_from_row(row: &PgRow) -> Request {
    let kind: String = row.get("type");
    let status: String = row.get("status");
    let selected: Option<serde_json::Value> = row.get("selected_members");
    Request {
        id: row.get("id"),
        student_id: row.get("student_id"),
        student_name: row.get("student_name"),
        kind: parse_kind(&kind),
        status: parse_status(&status),
        team_id: row.get("team_id"),
        team_name: row.get("team_name"),
        message: row.get("message"),
        logo_url: row.get("logo_url"),
        selected_members: parse_selected_members(selected.as_ref()),
        created_at: row.get("created_at"),
    }
}

/// List requests, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_requests(pool: &PgPool, filter: &RequestFilter) -> Result<Vec<Request>, RequestError> {
    let sql = format!("{REQUEST_VIEW_SQL} WHERE ($1::text IS NULL OR r.status = $1) ORDER BY r.created_at DESC, r.id");
    let rows = sqlx::query(&sql)
        .bind(filter.status.map(RequestStatus::as_str))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(request_from_row).collect())
}

/// # Errors
///
/// `NotFound` if no request matches.
pub async fn get_request(pool: &PgPool, request_id: Uuid) -> Result<Request, RequestError> {
    let sql = format!("{REQUEST_VIEW_SQL} WHERE r.id = $1");
    sqlx::query(&sql)
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .map(|row| request_from_row(&row))
        .ok_or(RequestError::NotFound(request_id))
}

async fn lock_request(conn: &mut PgConnection, request_id: Uuid) -> Result<StoredRequest, RequestError> {
    let row = sqlx::query(
        "SELECT id, student_id, type, status, team_id, team_name, logo_url, selected_members
         FROM requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(conn)
    .await?
    .ok_or(RequestError::NotFound(request_id))?;

    let kind: String = row.get("type");
    let status: String = row.get("status");
    let selected: Option<serde_json::Value> = row.get("selected_members");
    Ok(StoredRequest {
        id: row.get("id"),
        student_id: row.get("student_id"),
        kind: parse_kind(&kind),
        status: parse_status(&status),
        team_id: row.get("team_id"),
        team_name: row.get("team_name"),
        logo_url: row.get("logo_url"),
        selected_members: parse_selected_members(selected.as_ref()),
    })
}

async fn lock_team(conn: &mut PgConnection, team_id: Uuid) -> Result<Option<TeamSnapshot>, sqlx::Error> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM teams WHERE id = $1 FOR UPDATE")
        .bind(team_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(status) = status else {
        return Ok(None);
    };
    let count = team::member_count(conn, team_id).await?;
    Ok(Some(TeamSnapshot {
        status: TeamStatus::from_str(&status).unwrap_or(TeamStatus::Inactive),
        member_count: usize::try_from(count).unwrap_or(usize::MAX),
    }))
}

// =============================================================================
// SUBMIT
// =============================================================================

/// Submit a join or create request. The requester becomes `pending`.
///
/// # Errors
///
/// Validation errors, unknown or unavailable students, a second pending
/// request, or a target team that is missing, inactive, or full.
pub async fn submit_request(pool: &PgPool, max_team_members: usize, input: &NewRequest) -> Result<Request, RequestError> {
    let valid = validate_new_request(input, max_team_members)?;
    let requester = input.student_id;

    let mut tx = pool.begin().await?;
    let prior_status = lock_placeable(tx.as_mut(), requester, AVAILABLE).await?;

    let already: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM requests WHERE student_id = $1 AND status = 'pending')")
            .bind(requester)
            .fetch_one(tx.as_mut())
            .await?;
    if already {
        return Err(RequestError::AlreadyPending(requester));
    }

    let request_id: Uuid = match &valid {
        ValidRequest::Join { team_id, message } => {
            let snapshot = lock_team(tx.as_mut(), *team_id)
                .await?
                .ok_or(RequestError::TeamNotFound(*team_id))?;
            if snapshot.status != TeamStatus::Active {
                return Err(RequestError::TeamInactive(*team_id));
            }
            if snapshot.member_count >= max_team_members {
                return Err(RequestError::TeamFull(*team_id));
            }
            sqlx::query_scalar(
                "INSERT INTO requests (student_id, type, team_id, message, requester_prior_status)
                 VALUES ($1, 'join', $2, $3, $4) RETURNING id",
            )
            .bind(requester)
            .bind(team_id)
            .bind(message)
            .bind(prior_status.as_str())
            .fetch_one(tx.as_mut())
            .await?
        }
        ValidRequest::Create { team_name, message, logo_url, selected_members } => {
            lock_all_placeable(tx.as_mut(), selected_members).await?;
            sqlx::query_scalar(
                "INSERT INTO requests
                     (student_id, type, team_name, message, logo_url, selected_members, requester_prior_status)
                 VALUES ($1, 'create', $2, $3, $4, $5, $6) RETURNING id",
            )
            .bind(requester)
            .bind(team_name)
            .bind(message)
            .bind(logo_url)
            .bind(sqlx::types::Json(selected_members))
            .bind(prior_status.as_str())
            .fetch_one(tx.as_mut())
            .await?
        }
    };

    student::set_status(tx.as_mut(), &[requester], StudentStatus::Pending).await?;
    tx.commit().await?;

    tracing::info!(%request_id, student_id = %requester, kind = input.kind.as_str(), "request submitted");
    get_request(pool, request_id).await
}

const AVAILABLE: &[StudentStatus] = &[StudentStatus::Free, StudentStatus::Active];

/// A requester awaiting approval is `pending`; an admin may also have reset them.
const AWAITING_APPROVAL: &[StudentStatus] = &[StudentStatus::Pending, StudentStatus::Free, StudentStatus::Active];

/// Lock a student row and check they can be placed on a team: unarchived,
/// in one of `accepted` statuses, and not already a member anywhere.
async fn lock_placeable(
    conn: &mut PgConnection,
    student_id: Uuid,
    accepted: &[StudentStatus],
) -> Result<StudentStatus, RequestError> {
    let (status, archived) =
        sqlx::query_as::<_, (String, bool)>("SELECT status, archived FROM students WHERE id = $1 FOR UPDATE")
            .bind(student_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(RequestError::StudentNotFound(student_id))?;
    let status = StudentStatus::from_str(&status)
        .filter(|s| !archived && accepted.contains(s))
        .ok_or(RequestError::StudentUnavailable(student_id))?;

    let on_team: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM team_members WHERE student_id = $1)")
        .bind(student_id)
        .fetch_one(conn)
        .await?;
    if on_team {
        return Err(RequestError::StudentUnavailable(student_id));
    }
    Ok(status)
}

/// Lock pre-selected members in id order so concurrent callers cannot deadlock.
async fn lock_all_placeable(conn: &mut PgConnection, members: &[Uuid]) -> Result<(), RequestError> {
    let mut ordered = members.to_vec();
    ordered.sort_unstable();
    for member in ordered {
        lock_placeable(&mut *conn, member, AVAILABLE).await?;
    }
    Ok(())
}

// =============================================================================
// APPROVE / DENY
// =============================================================================

/// Approve a pending request and apply it.
///
/// # Errors
///
/// `NotFound`, `NotPending`, a join target that is gone, inactive, or full,
/// or `StudentUnavailable` when someone being placed has since joined a team,
/// been archived, or moved on.
pub async fn approve_request(
    pool: &PgPool,
    max_team_members: usize,
    request_id: Uuid,
) -> Result<ApprovalOutcome, RequestError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(tx.as_mut(), request_id).await?;

    let snapshot = match (request.kind, request.team_id) {
        (RequestKind::Join, Some(team_id)) if request.status == RequestStatus::Pending => {
            lock_team(tx.as_mut(), team_id).await?
        }
        _ => None,
    };
    let plan = plan_approval(&request, snapshot, max_team_members)?;

    lock_placeable(tx.as_mut(), request.student_id, AWAITING_APPROVAL).await?;
    if let ApprovalPlan::CreateTeam { members, .. } = &plan {
        lock_all_placeable(tx.as_mut(), members).await?;
    }

    let team_id = match plan {
        ApprovalPlan::CreateTeam { leader_id, team_name, logo_url, members } => {
            let team_id: Uuid = sqlx::query_scalar(
                "INSERT INTO teams (name, leader_id, status, logo_url)
                 VALUES ($1, $2, 'active', $3) RETURNING id",
            )
            .bind(&team_name)
            .bind(leader_id)
            .bind(&logo_url)
            .fetch_one(tx.as_mut())
            .await?;

            sqlx::query("INSERT INTO team_members (team_id, student_id, role) VALUES ($1, $2, $3)")
                .bind(team_id)
                .bind(leader_id)
                .bind(LEADER_ROLE)
                .execute(tx.as_mut())
                .await?;
            sqlx::query(
                "INSERT INTO team_members (team_id, student_id, role)
                 SELECT $1, member_id, $3 FROM unnest($2::uuid[]) AS member_id",
            )
            .bind(team_id)
            .bind(&members)
            .bind(MEMBER_ROLE)
            .execute(tx.as_mut())
            .await?;
            student::set_status(tx.as_mut(), &members, StudentStatus::TeamAssigned).await?;

            tracing::info!(%request_id, %team_id, members = members.len(), "team created from request");
            team_id
        }
        ApprovalPlan::JoinTeam { team_id, student_id } => {
            sqlx::query("INSERT INTO team_members (team_id, student_id, role) VALUES ($1, $2, $3)")
                .bind(team_id)
                .bind(student_id)
                .bind(MEMBER_ROLE)
                .execute(tx.as_mut())
                .await?;
            tracing::info!(%request_id, %team_id, %student_id, "student joined team");
            team_id
        }
    };

    sqlx::query("UPDATE requests SET status = 'approved', updated_at = now() WHERE id = $1")
        .bind(request_id)
        .execute(tx.as_mut())
        .await?;
    student::set_status(tx.as_mut(), &[request.student_id], StudentStatus::TeamAssigned).await?;
    tx.commit().await?;

    Ok(ApprovalOutcome { request_id, team_id })
}

/// Deny a pending request. A requester still `pending` gets back the status
/// they had when submitting.
///
/// # Errors
///
/// `NotFound` or `NotPending`.
pub async fn deny_request(pool: &PgPool, request_id: Uuid) -> Result<(), RequestError> {
    let mut tx = pool.begin().await?;
    let request = lock_request(tx.as_mut(), request_id).await?;
    if request.status != RequestStatus::Pending {
        return Err(RequestError::NotPending { id: request_id, status: request.status });
    }

    sqlx::query("UPDATE requests SET status = 'denied', updated_at = now() WHERE id = $1")
        .bind(request_id)
        .execute(tx.as_mut())
        .await?;
    sqlx::query(
        "UPDATE students s
         SET status = COALESCE(r.requester_prior_status, 'free'), updated_at = now()
         FROM requests r
         WHERE r.id = $1 AND s.id = r.student_id AND s.status = 'pending'",
    )
    .bind(request_id)
    .execute(tx.as_mut())
    .await?;
    tx.commit().await?;

    tracing::info!(%request_id, student_id = %request.student_id, "request denied");
    Ok(())
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
