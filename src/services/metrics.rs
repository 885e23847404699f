//! SRL skill metrics and their history.
//!
//! Each student has at most one current metrics row. Every write also appends
//! a snapshot to `metric_history` in the same transaction, so the history is
//! the exact sequence of values an admin saved.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::validation::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("student not found: {0}")]
    StudentNotFound(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for MetricsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::StudentNotFound(_) => "E_STUDENT_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::StudentNotFound(_) => StatusCode::NOT_FOUND,
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

/// The six tracked scores, each 0..=100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetrics {
    pub technical_skills: i32,
    pub collaboration: i32,
    pub adaptability: i32,
    pub consistency: i32,
    pub problem_solving: i32,
    pub srl_score: i32,
}

impl SkillMetrics {
    /// # Errors
    ///
    /// Names the first score outside 0..=100.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::score("technical_skills", self.technical_skills)?;
        validation::score("collaboration", self.collaboration)?;
        validation::score("adaptability", self.adaptability)?;
        validation::score("consistency", self.consistency)?;
        validation::score("problem_solving", self.problem_solving)?;
        validation::score("srl_score", self.srl_score)?;
        Ok(())
    }

    pub(crate) fn from_row(row: &PgRow) -> Self {
        Self {
            technical_skills: row.get("technical_skills"),
            collaboration: row.get("collaboration"),
            adaptability: row.get("adaptability"),
            consistency: row.get("consistency"),
            problem_solving: row.get("problem_solving"),
            srl_score: row.get("srl_score"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentMetrics {
    pub student_id: Uuid,
    #[serde(flatten)]
    pub scores: SkillMetrics,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    #[serde(flatten)]
    pub scores: SkillMetrics,
    pub recorded_at: String,
}

const SCORE_COLUMNS: &str = "technical_skills, collaboration, adaptability, consistency, problem_solving, srl_score";

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_metrics(pool: &PgPool, student_id: Uuid) -> Result<Option<StudentMetrics>, MetricsError> {
    let sql = format!(
        r#"SELECT student_id, {SCORE_COLUMNS},
                  to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
           FROM student_metrics WHERE student_id = $1"#
    );
    let row = sqlx::query(&sql).bind(student_id).fetch_optional(pool).await?;
    Ok(row.map(|r| StudentMetrics {
        student_id: r.get("student_id"),
        scores: SkillMetrics::from_row(&r),
        updated_at: r.get("updated_at"),
    }))
}

/// Upsert the current scores and append a history snapshot.
///
/// # Errors
///
/// `Validation` for out-of-range scores, `StudentNotFound` for unknown ids.
pub async fn set_metrics(pool: &PgPool, student_id: Uuid, scores: &SkillMetrics) -> Result<StudentMetrics, MetricsError> {
    scores.validate()?;

    let mut tx = pool.begin().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM students WHERE id = $1)")
        .bind(student_id)
        .fetch_one(tx.as_mut())
        .await?;
    if !exists {
        return Err(MetricsError::StudentNotFound(student_id));
    }

    let updated_at: String = sqlx::query_scalar(&format!(
        r#"INSERT INTO student_metrics (student_id, {SCORE_COLUMNS})
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (student_id) DO UPDATE SET
               technical_skills = EXCLUDED.technical_skills,
               collaboration = EXCLUDED.collaboration,
               adaptability = EXCLUDED.adaptability,
               consistency = EXCLUDED.consistency,
               problem_solving = EXCLUDED.problem_solving,
               srl_score = EXCLUDED.srl_score,
               updated_at = now()
           RETURNING to_char(updated_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')"#
    ))
    .bind(student_id)
    .bind(scores.technical_skills)
    .bind(scores.collaboration)
    .bind(scores.adaptability)
    .bind(scores.consistency)
    .bind(scores.problem_solving)
    .bind(scores.srl_score)
    .fetch_one(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "INSERT INTO metric_history (student_id, {SCORE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    ))
    .bind(student_id)
    .bind(scores.technical_skills)
    .bind(scores.collaboration)
    .bind(scores.adaptability)
    .bind(scores.consistency)
    .bind(scores.problem_solving)
    .bind(scores.srl_score)
    .execute(tx.as_mut())
    .await?;

    tx.commit().await?;
    tracing::info!(%student_id, srl_score = scores.srl_score, "metrics updated");
    Ok(StudentMetrics { student_id, scores: *scores, updated_at })
}

/// Snapshots, oldest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn metric_history(pool: &PgPool, student_id: Uuid) -> Result<Vec<MetricSnapshot>, MetricsError> {
    let sql = format!(
        r#"SELECT {SCORE_COLUMNS},
                  to_char(recorded_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS recorded_at
           FROM metric_history WHERE student_id = $1
           ORDER BY recorded_at, id"#
    );
    let rows = sqlx::query(&sql).bind(student_id).fetch_all(pool).await?;
    Ok(rows
        .iter()
        .map(|r| MetricSnapshot { scores: SkillMetrics::from_row(r), recorded_at: r.get("recorded_at") })
        .collect())
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
