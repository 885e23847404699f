//! Student reflections and action plans.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::validation::{self, ValidationError};

pub const REFLECTION_MAX: usize = 5000;
pub const MILESTONE_MAX: usize = 200;
pub const TASK_TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 2000;
pub const OWNER_MAX: usize = 100;

const DEFAULT_REFLECTION_LIMIT: i64 = 50;
const MAX_REFLECTION_LIMIT: i64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("student not found: {0}")]
    StudentNotFound(Uuid),
    #[error("action plan not found: {0}")]
    PlanNotFound(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for JournalError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::StudentNotFound(_) => "E_STUDENT_NOT_FOUND",
            Self::PlanNotFound(_) => "E_ACTION_PLAN_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::StudentNotFound(_) | Self::PlanNotFound(_) => StatusCode::NOT_FOUND,
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

// =============================================================================
// REFLECTIONS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Reflection {
    pub id: Uuid,
    pub student_id: Uuid,
    pub reflection_text: String,
    pub milestone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReflection {
    pub reflection_text: String,
    pub milestone: Option<String>,
}

/// Clamp a caller-supplied page size.
#[must_use]
pub fn reflection_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_REFLECTION_LIMIT).clamp(1, MAX_REFLECTION_LIMIT)
}

const REFLECTION_COLUMNS: &str = r#"id, student_id, reflection_text, milestone,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at"#;

fn reflection_from_row(row: &PgRow) -> Reflection {
    Reflection {
        id: row.get("id"),
        student_id: row.get("student_id"),
        reflection_text: row.get("reflection_text"),
        milestone: row.get("milestone"),
        created_at: row.get("created_at"),
    }
}

/// Newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_reflections(pool: &PgPool, student_id: Uuid, limit: i64) -> Result<Vec<Reflection>, JournalError> {
    let sql = format!(
        "SELECT {REFLECTION_COLUMNS} FROM student_reflections
         WHERE student_id = $1
         ORDER BY created_at DESC, id
         LIMIT $2"
    );
    let rows = sqlx::query(&sql).bind(student_id).bind(limit).fetch_all(pool).await?;
    Ok(rows.iter().map(reflection_from_row).collect())
}

/// Every reflection, newest first. Used by the export.
pub(crate) async fn all_reflections(pool: &PgPool) -> Result<Vec<Reflection>, sqlx::Error> {
    let sql = format!("SELECT {REFLECTION_COLUMNS} FROM student_reflections ORDER BY created_at DESC, id");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(reflection_from_row).collect())
}

/// # Errors
///
/// `Validation` for empty or overlong text, `StudentNotFound` for unknown ids.
pub async fn add_reflection(pool: &PgPool, student_id: Uuid, input: &NewReflection) -> Result<Reflection, JournalError> {
    let text = validation::required_text("reflection_text", "Reflection", &input.reflection_text, REFLECTION_MAX)?;
    let milestone = validation::optional_text("milestone", "Milestone", input.milestone.as_deref(), MILESTONE_MAX)?;

    let sql = format!(
        "INSERT INTO student_reflections (student_id, reflection_text, milestone)
         SELECT id, $2, $3 FROM students WHERE id = $1
         RETURNING {REFLECTION_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(student_id)
        .bind(&text)
        .bind(&milestone)
        .fetch_optional(pool)
        .await?
        .ok_or(JournalError::StudentNotFound(student_id))?;
    Ok(reflection_from_row(&row))
}

// =============================================================================
// ACTION PLANS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPlanStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl ActionPlanStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed plans reopen as pending; anything else completes.
    #[must_use]
    pub fn toggled(self) -> Self {
        if self == Self::Completed { Self::Pending } else { Self::Completed }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionPlan {
    pub id: Uuid,
    pub student_id: Uuid,
    pub task_title: String,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub owner: Option<String>,
    pub status: ActionPlanStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActionPlan {
    pub task_title: String,
    pub description: Option<String>,
    pub deadline: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionPlanStatusUpdate {
    pub status: ActionPlanStatus,
}

const PLAN_COLUMNS: &str = r#"id, student_id, task_title, description,
    to_char(deadline, 'YYYY-MM-DD') AS deadline, owner, status,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at"#;

fn plan_from_row(row: &PgRow) -> ActionPlan {
    let status: String = row.get("status");
    ActionPlan {
        id: row.get("id"),
        student_id: row.get("student_id"),
        task_title: row.get("task_title"),
        description: row.get("description"),
        deadline: row.get("deadline"),
        owner: row.get("owner"),
        status: ActionPlanStatus::from_str(&status).unwrap_or(ActionPlanStatus::Pending),
        created_at: row.get("created_at"),
    }
}

/// Ordered by deadline; undated plans last.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_action_plans(pool: &PgPool, student_id: Uuid) -> Result<Vec<ActionPlan>, JournalError> {
    let sql = format!(
        "SELECT {PLAN_COLUMNS} FROM student_action_plans
         WHERE student_id = $1
         ORDER BY deadline ASC NULLS LAST, created_at"
    );
    let rows = sqlx::query(&sql).bind(student_id).fetch_all(pool).await?;
    Ok(rows.iter().map(plan_from_row).collect())
}

/// Every action plan, by deadline. Used by the export.
pub(crate) async fn all_action_plans(pool: &PgPool) -> Result<Vec<ActionPlan>, sqlx::Error> {
    let sql = format!("SELECT {PLAN_COLUMNS} FROM student_action_plans ORDER BY deadline ASC NULLS LAST, created_at");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(plan_from_row).collect())
}

/// # Errors
///
/// `Validation` for a bad title, description, deadline, or owner;
/// `StudentNotFound` for unknown ids.
pub async fn create_action_plan(pool: &PgPool, student_id: Uuid, input: &NewActionPlan) -> Result<ActionPlan, JournalError> {
    let title = validation::required_text("task_title", "Task title", &input.task_title, TASK_TITLE_MAX)?;
    let description =
        validation::optional_text("description", "Description", input.description.as_deref(), DESCRIPTION_MAX)?;
    let deadline = validation::optional_date("deadline", input.deadline.as_deref())?;
    let owner = validation::optional_text("owner", "Owner", input.owner.as_deref(), OWNER_MAX)?;

    let sql = format!(
        "INSERT INTO student_action_plans (student_id, task_title, description, deadline, owner)
         SELECT id, $2, $3, $4, $5 FROM students WHERE id = $1
         RETURNING {PLAN_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(student_id)
        .bind(&title)
        .bind(&description)
        .bind(&deadline)
        .bind(&owner)
        .fetch_optional(pool)
        .await?
        .ok_or(JournalError::StudentNotFound(student_id))?;
    Ok(plan_from_row(&row))
}

/// Flip completed ↔ pending.
///
/// # Errors
///
/// `PlanNotFound` for unknown ids.
pub async fn toggle_action_plan(pool: &PgPool, plan_id: Uuid) -> Result<ActionPlan, JournalError> {
    let mut tx = pool.begin().await?;
    let current: String = sqlx::query_scalar("SELECT status FROM student_action_plans WHERE id = $1 FOR UPDATE")
        .bind(plan_id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(JournalError::PlanNotFound(plan_id))?;
    let next = ActionPlanStatus::from_str(&current)
        .unwrap_or(ActionPlanStatus::Pending)
        .toggled();

    let plan = write_status(tx.as_mut(), plan_id, next).await?;
    tx.commit().await?;
    Ok(plan)
}

/// # Errors
///
/// `PlanNotFound` for unknown ids.
pub async fn set_action_plan_status(
    pool: &PgPool,
    plan_id: Uuid,
    status: ActionPlanStatus,
) -> Result<ActionPlan, JournalError> {
    let mut conn = pool.acquire().await?;
    write_status(&mut conn, plan_id, status).await
}

async fn write_status(
    conn: &mut PgConnection,
    plan_id: Uuid,
    status: ActionPlanStatus,
) -> Result<ActionPlan, JournalError> {
    let sql = format!(
        "UPDATE student_action_plans SET status = $2, updated_at = now()
         WHERE id = $1
         RETURNING {PLAN_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(plan_id)
        .bind(status.as_str())
        .fetch_optional(conn)
        .await?
        .ok_or(JournalError::PlanNotFound(plan_id))?;
    tracing::debug!(%plan_id, status = status.as_str(), "action plan status set");
    Ok(plan_from_row(&row))
}

#[cfg(test)]
#[path = "journal_test.rs"]
mod tests;
