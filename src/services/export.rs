//! Full-cohort export as JSON or CSV.
//!
//! Both formats are rendered into line-sized chunks so the route can stream
//! them as the response body.

use std::collections::HashMap;

use axum::http::StatusCode;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::journal::{self, ActionPlan, Reflection};
use crate::services::metrics::SkillMetrics;

pub const CSV_HEADER: [&str; 14] = [
    "ID",
    "Name",
    "University Email",
    "Personal Email",
    "Status",
    "Team",
    "Role",
    "SRL Score",
    "Technical Skills",
    "Collaboration",
    "Adaptability",
    "Consistency",
    "Problem Solving",
    "Created At",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ExportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Csv(_) | Self::Json(_) => "E_EXPORT",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn db_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMembership {
    pub team_id: Uuid,
    pub team_name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportStudent {
    pub id: Uuid,
    pub name: String,
    pub university_email: String,
    pub personal_email: Option<String>,
    pub status: String,
    pub archived: bool,
    pub created_at: String,
    pub team_members: Vec<ExportMembership>,
    pub student_metrics: Option<SkillMetrics>,
    pub student_reflections: Vec<Reflection>,
    pub student_action_plans: Vec<ActionPlan>,
}

/// `all_students_<date>.<ext>`.
#[must_use]
pub fn export_filename(date: time::Date, extension: &str) -> String {
    format!(
        "all_students_{:04}-{:02}-{:02}.{extension}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

// =============================================================================
// RENDERING
// =============================================================================

/// Header line followed by one line per student. Every cell is quoted.
///
/// # Errors
///
/// Returns a CSV error if a record cannot be written.
pub fn csv_chunks(students: &[ExportStudent]) -> Result<Vec<String>, ExportError> {
    let mut chunks = Vec::with_capacity(students.len() + 1);
    chunks.push(csv_line(&CSV_HEADER)?);

    for student in students {
        let membership = student.team_members.first();
        let scores = student.student_metrics.unwrap_or_default();
        let id = student.id.to_string();
        let numbers = [
            scores.srl_score,
            scores.technical_skills,
            scores.collaboration,
            scores.adaptability,
            scores.consistency,
            scores.problem_solving,
        ]
        .map(|n| n.to_string());

        let mut record: Vec<&str> = vec![
            id.as_str(),
            student.name.as_str(),
            student.university_email.as_str(),
            student.personal_email.as_deref().unwrap_or_default(),
            student.status.as_str(),
            membership.map(|m| m.team_name.as_str()).unwrap_or_default(),
            membership.and_then(|m| m.role.as_deref()).unwrap_or_default(),
        ];
        record.extend(numbers.iter().map(String::as_str));
        record.push(student.created_at.as_str());
        chunks.push(csv_line(&record)?);
    }
    Ok(chunks)
}

fn csv_line(record: &[&str]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(record)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// A pretty-printed JSON array, one chunk per student.
///
/// # Errors
///
/// Returns a JSON error if a student cannot be serialized.
pub fn json_chunks(students: &[ExportStudent]) -> Result<Vec<String>, ExportError> {
    let mut chunks = Vec::with_capacity(students.len() + 2);
    chunks.push("[\n".to_string());
    for (i, student) in students.iter().enumerate() {
        let separator = if i + 1 < students.len() { ",\n" } else { "\n" };
        chunks.push(format!("{}{separator}", serde_json::to_string_pretty(student)?));
    }
    chunks.push("]\n".to_string());
    Ok(chunks)
}

// =============================================================================
// LOADING
// =============================================================================

/// Every student with related rows, ordered by name.
///
/// # Errors
///
/// Returns a database error if any query fails.
pub async fn load_export(pool: &PgPool) -> Result<Vec<ExportStudent>, ExportError> {
    let students = sqlx::query(
        r#"SELECT id, name, university_email, personal_email, status, archived,
                  to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
           FROM students
           ORDER BY name, created_at"#,
    )
    .fetch_all(pool)
    .await?;

    let mut memberships: HashMap<Uuid, Vec<ExportMembership>> = HashMap::new();
    for (student_id, team_id, team_name, role) in sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>)>(
        "SELECT tm.student_id, t.id, t.name, tm.role
         FROM team_members tm JOIN teams t ON t.id = tm.team_id
         ORDER BY tm.joined_at",
    )
    .fetch_all(pool)
    .await?
    {
        memberships.entry(student_id).or_default().push(ExportMembership { team_id, team_name, role });
    }

    let mut metrics: HashMap<Uuid, SkillMetrics> = HashMap::new();
    for row in sqlx::query(
        "SELECT student_id, technical_skills, collaboration, adaptability, consistency, problem_solving, srl_score
         FROM student_metrics",
    )
    .fetch_all(pool)
    .await?
    {
        metrics.insert(row.get("student_id"), SkillMetrics::from_row(&row));
    }

    let mut reflections: HashMap<Uuid, Vec<Reflection>> = HashMap::new();
    for reflection in journal::all_reflections(pool).await? {
        reflections.entry(reflection.student_id).or_default().push(reflection);
    }
    let mut plans: HashMap<Uuid, Vec<ActionPlan>> = HashMap::new();
    for plan in journal::all_action_plans(pool).await? {
        plans.entry(plan.student_id).or_default().push(plan);
    }

    let mut exported = Vec::with_capacity(students.len());
    for row in students {
        let id: Uuid = row.get("id");
        exported.push(ExportStudent {
            id,
            name: row.get("name"),
            university_email: row.get("university_email"),
            personal_email: row.get("personal_email"),
            status: row.get("status"),
            archived: row.get("archived"),
            created_at: row.get("created_at"),
            team_members: memberships.remove(&id).unwrap_or_default(),
            student_metrics: metrics.remove(&id),
            student_reflections: reflections.remove(&id).unwrap_or_default(),
            student_action_plans: plans.remove(&id).unwrap_or_default(),
        });
    }
    tracing::info!(students = exported.len(), "export assembled");
    Ok(exported)
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
