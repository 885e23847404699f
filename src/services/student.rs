//! Student service: registration, admin CRUD, and status transitions.
//!
//! DESIGN
//! ======
//! Statuses are stored as text (checked by the schema) and parsed into
//! [`StudentStatus`] at the edge. Status changes driven by the request
//! workflow go through [`set_status`], which takes a connection so callers can
//! run it inside their own transaction.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::validation::{self, ValidationError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Free,
    Active,
    Busy,
    Pending,
    TeamAssigned,
    Inactive,
    Graduated,
}

impl StudentStatus {
    pub const ALL: [Self; 7] = [
        Self::Free,
        Self::Active,
        Self::Busy,
        Self::Pending,
        Self::TeamAssigned,
        Self::Inactive,
        Self::Graduated,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Active => "active",
            Self::Busy => "busy",
            Self::Pending => "pending",
            Self::TeamAssigned => "team_assigned",
            Self::Inactive => "inactive",
            Self::Graduated => "graduated",
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Whether a student in this status may submit or be named in a request.
    #[must_use]
    pub fn is_available(self) -> bool {
        matches!(self, Self::Free | Self::Active)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StudentError {
    #[error("student not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StudentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_STUDENT_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
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

#[derive(Debug, Clone, Serialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub university_email: String,
    pub personal_email: Option<String>,
    pub status: StudentStatus,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// The team a student currently belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub team_id: Uuid,
    pub team_name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
    pub status: Option<StudentStatus>,
    #[serde(default)]
    pub include_archived: bool,
}

/// Body for public self-registration and admin creation.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentInput {
    pub name: String,
    pub university_email: String,
    pub personal_email: Option<String>,
    pub status: Option<StudentStatus>,
}

/// Partial update. An empty `personal_email` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub university_email: Option<String>,
    pub personal_email: Option<String>,
    pub status: Option<StudentStatus>,
    pub archived: Option<bool>,
}

/// Validated, normalized student fields ready for insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidStudent {
    pub name: String,
    pub university_email: String,
    pub personal_email: Option<String>,
    pub status: StudentStatus,
}

pub(crate) const STUDENT_COLUMNS: &str = r#"id, name, university_email, personal_email, status, archived,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at"#;

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate a new-student form. `default_status` applies when none is given.
///
/// # Errors
///
/// Returns the first field that fails validation.
pub fn validate_input(
    input: &StudentInput,
    domain: &str,
    default_status: StudentStatus,
) -> Result<ValidStudent, ValidationError> {
    Ok(ValidStudent {
        name: validation::student_name(&input.name)?,
        university_email: validation::university_email(&input.university_email, domain)?,
        personal_email: validation::optional_email("personal_email", input.personal_email.as_deref())?,
        status: input.status.unwrap_or(default_status),
    })
}

// =============================================================================
// QUERIES
// =============================================================================

pub(crate) fn student_from_row(row: &PgRow) -> Student {
    let raw_status: String = row.get("status");
    let status = StudentStatus::from_str(&raw_status).unwrap_or_else(|| {
        tracing::warn!(status = %raw_status, "unknown student status in database");
        StudentStatus::Inactive
    });
    Student {
        id: row.get("id"),
        name: row.get("name"),
        university_email: row.get("university_email"),
        personal_email: row.get("personal_email"),
        status,
        archived: row.get("archived"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// List students, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_students(pool: &PgPool, filter: &StudentFilter) -> Result<Vec<Student>, StudentError> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students
         WHERE ($1::text IS NULL OR status = $1) AND ($2 OR NOT archived)
         ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query(&sql)
        .bind(filter.status.map(StudentStatus::as_str))
        .bind(filter.include_archived)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(student_from_row).collect())
}

/// Fetch one student.
///
/// # Errors
///
/// `NotFound` if no row matches.
pub async fn get_student(pool: &PgPool, student_id: Uuid) -> Result<Student, StudentError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1");
    sqlx::query(&sql)
        .bind(student_id)
        .fetch_optional(pool)
        .await?
        .map(|row| student_from_row(&row))
        .ok_or(StudentError::NotFound(student_id))
}

/// The student's current team, if any.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_membership(pool: &PgPool, student_id: Uuid) -> Result<Option<Membership>, StudentError> {
    let row = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
        "SELECT t.id, t.name, tm.role
         FROM team_members tm
         JOIN teams t ON t.id = tm.team_id
         WHERE tm.student_id = $1
         ORDER BY tm.joined_at
         LIMIT 1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(team_id, team_name, role)| Membership { team_id, team_name, role }))
}

/// Public self-registration. New students start as `free`.
///
/// # Errors
///
/// Validation errors, or a database error (duplicate e-mail surfaces as 23505).
pub async fn register_student(pool: &PgPool, domain: &str, input: &StudentInput) -> Result<Student, StudentError> {
    let public_input = StudentInput { status: None, ..input.clone() };
    let valid = validate_input(&public_input, domain, StudentStatus::Free)?;
    insert_student(pool, &valid).await
}

/// Admin creation. Status defaults to `active`.
///
/// # Errors
///
/// Validation errors, or a database error.
pub async fn create_student(pool: &PgPool, domain: &str, input: &StudentInput) -> Result<Student, StudentError> {
    let valid = validate_input(input, domain, StudentStatus::Active)?;
    insert_student(pool, &valid).await
}

async fn insert_student(pool: &PgPool, valid: &ValidStudent) -> Result<Student, StudentError> {
    let sql = format!(
        "INSERT INTO students (name, university_email, personal_email, status)
         VALUES ($1, $2, $3, $4)
         RETURNING {STUDENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&valid.name)
        .bind(&valid.university_email)
        .bind(&valid.personal_email)
        .bind(valid.status.as_str())
        .fetch_one(pool)
        .await?;
    let student = student_from_row(&row);
    tracing::info!(student_id = %student.id, status = student.status.as_str(), "student created");
    Ok(student)
}

/// Apply a partial update.
///
/// # Errors
///
/// `NotFound`, validation errors, or a database error.
pub async fn update_student(
    pool: &PgPool,
    domain: &str,
    student_id: Uuid,
    patch: &StudentPatch,
) -> Result<Student, StudentError> {
    let name = patch.name.as_deref().map(validation::student_name).transpose()?;
    let university_email = patch
        .university_email
        .as_deref()
        .map(|email| validation::university_email(email, domain))
        .transpose()?;
    let (touch_personal, personal_email) = match patch.personal_email.as_deref() {
        Some(raw) => (true, validation::optional_email("personal_email", Some(raw))?),
        None => (false, None),
    };

    let sql = format!(
        "UPDATE students SET
             name = COALESCE($2, name),
             university_email = COALESCE($3, university_email),
             personal_email = CASE WHEN $4 THEN $5 ELSE personal_email END,
             status = COALESCE($6, status),
             archived = COALESCE($7, archived),
             updated_at = now()
         WHERE id = $1
         RETURNING {STUDENT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(student_id)
        .bind(name)
        .bind(university_email)
        .bind(touch_personal)
        .bind(personal_email)
        .bind(patch.status.map(StudentStatus::as_str))
        .bind(patch.archived)
        .fetch_optional(pool)
        .await?
        .ok_or(StudentError::NotFound(student_id))?;
    Ok(student_from_row(&row))
}

/// Delete a student. Dependent rows cascade.
///
/// # Errors
///
/// `NotFound` if no row matches.
pub async fn delete_student(pool: &PgPool, student_id: Uuid) -> Result<(), StudentError> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(student_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StudentError::NotFound(student_id));
    }
    tracing::info!(%student_id, "student deleted");
    Ok(())
}

/// Set the status of every listed student. Returns rows updated.
pub(crate) async fn set_status(
    conn: &mut PgConnection,
    student_ids: &[Uuid],
    status: StudentStatus,
) -> Result<u64, sqlx::Error> {
    if student_ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query("UPDATE students SET status = $2, updated_at = now() WHERE id = ANY($1)")
        .bind(student_ids)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "student_test.rs"]
mod tests;
