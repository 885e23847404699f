//! Team service: listings with capacity, admin edits, and membership changes.
//!
//! DESIGN
//! ======
//! Listings are assembled from three set queries (teams, members, pending join
//! counts) rather than one query per team. Every membership mutation that also
//! touches student status or the leader pointer runs in a single transaction.

use std::collections::HashMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::student::{self, StudentStatus};
use crate::validation::{self, ValidationError};

pub const LEADER_ROLE: &str = "Leader";
pub const MEMBER_ROLE: &str = "Member";

const CHARTER_MAX: usize = 5000;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Active,
    Inactive,
}

impl TeamStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    #[error("team not found: {0}")]
    NotFound(Uuid),
    #[error("student {student_id} is not a member of team {team_id}")]
    NotAMember { team_id: Uuid, student_id: Uuid },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for TeamError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_TEAM_NOT_FOUND",
            Self::NotAMember { .. } => "E_NOT_A_MEMBER",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::NotAMember { .. } => StatusCode::NOT_FOUND,
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
pub struct TeamMember {
    pub student_id: Uuid,
    pub name: String,
    pub university_email: String,
    pub status: String,
    pub role: Option<String>,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderRef {
    pub id: Uuid,
    pub name: String,
}

/// Team with roster and capacity figures. `members` holds at most
/// `max_members` entries; `member_count` is the true count.
#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
    pub status: TeamStatus,
    pub charter: Option<String>,
    pub logo_url: Option<String>,
    pub leader: Option<LeaderRef>,
    pub members: Vec<TeamMember>,
    pub member_count: usize,
    pub open_slots: usize,
    pub pending_requests: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamFilter {
    pub status: Option<TeamStatus>,
}

/// Admin edit. Empty `charter` / `logo_url` clear the field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub status: Option<TeamStatus>,
    pub charter: Option<String>,
    pub logo_url: Option<String>,
}

/// Remaining capacity, floored at zero.
#[must_use]
pub fn open_slots(member_count: usize, max_members: usize) -> usize {
    max_members.saturating_sub(member_count)
}

const TEAM_COLUMNS: &str = r#"t.id, t.name, t.status, t.charter, t.logo_url, t.leader_id,
    s.name AS leader_name,
    to_char(t.created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at"#;

// =============================================================================
// READS
// =============================================================================

/// List teams, newest first. Defaults to active teams.
///
/// # Errors
///
/// Returns a database error if any query fails.
pub async fn list_teams(pool: &PgPool, filter: &TeamFilter, max_members: usize) -> Result<Vec<TeamSummary>, TeamError> {
    let status = filter.status.unwrap_or(TeamStatus::Active);
    let sql = format!(
        "SELECT {TEAM_COLUMNS}
         FROM teams t
         LEFT JOIN students s ON s.id = t.leader_id
         WHERE t.status = $1
         ORDER BY t.created_at DESC, t.id"
    );
    let rows = sqlx::query(&sql).bind(status.as_str()).fetch_all(pool).await?;
    assemble(pool, &rows, max_members).await
}

/// One team with its roster.
///
/// # Errors
///
/// `NotFound` if no team matches.
pub async fn get_team(pool: &PgPool, team_id: Uuid, max_members: usize) -> Result<TeamSummary, TeamError> {
    let sql = format!(
        "SELECT {TEAM_COLUMNS}
         FROM teams t
         LEFT JOIN students s ON s.id = t.leader_id
         WHERE t.id = $1"
    );
    let row = sqlx::query(&sql)
        .bind(team_id)
        .fetch_optional(pool)
        .await?
        .ok_or(TeamError::NotFound(team_id))?;
    assemble(pool, std::slice::from_ref(&row), max_members)
        .await?
        .pop()
        .ok_or(TeamError::NotFound(team_id))
}

async fn assemble(pool: &PgPool, rows: &[PgRow], max_members: usize) -> Result<Vec<TeamSummary>, TeamError> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
    let mut members = load_members(pool, &ids).await?;
    let pending = pending_join_counts(pool, &ids).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            let raw_status: String = row.get("status");
            let leader_id: Option<Uuid> = row.get("leader_id");
            let leader_name: Option<String> = row.get("leader_name");
            let mut roster = members.remove(&id).unwrap_or_default();
            let member_count = roster.len();
            roster.truncate(max_members);
            TeamSummary {
                id,
                name: row.get("name"),
                status: TeamStatus::from_str(&raw_status).unwrap_or(TeamStatus::Inactive),
                charter: row.get("charter"),
                logo_url: row.get("logo_url"),
                leader: leader_id.zip(leader_name).map(|(leader_id, name)| LeaderRef { id: leader_id, name }),
                members: roster,
                member_count,
                open_slots: open_slots(member_count, max_members),
                pending_requests: pending.get(&id).copied().unwrap_or(0),
                created_at: row.get("created_at"),
            }
        })
        .collect())
}

async fn load_members(pool: &PgPool, team_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<TeamMember>>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT tm.team_id, tm.student_id, s.name, s.university_email, s.status, tm.role,
                  to_char(tm.joined_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS joined_at
           FROM team_members tm
           JOIN students s ON s.id = tm.student_id
           WHERE tm.team_id = ANY($1)
           ORDER BY tm.joined_at, s.name"#,
    )
    .bind(team_ids)
    .fetch_all(pool)
    .await?;

    let mut by_team: HashMap<Uuid, Vec<TeamMember>> = HashMap::new();
    for row in rows {
        by_team.entry(row.get("team_id")).or_default().push(TeamMember {
            student_id: row.get("student_id"),
            name: row.get("name"),
            university_email: row.get("university_email"),
            status: row.get("status"),
            role: row.get("role"),
            joined_at: row.get("joined_at"),
        });
    }
    Ok(by_team)
}

async fn pending_join_counts(pool: &PgPool, team_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT team_id, COUNT(*) FROM requests
         WHERE type = 'join' AND status = 'pending' AND team_id = ANY($1)
         GROUP BY team_id",
    )
    .bind(team_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Current member count. Used inside request approval transactions.
pub(crate) async fn member_count(conn: &mut PgConnection, team_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM team_members WHERE team_id = $1")
        .bind(team_id)
        .fetch_one(conn)
        .await
}

// =============================================================================
// WRITES
// =============================================================================

/// Edit name, status, charter, or logo.
///
/// # Errors
///
/// `NotFound`, validation errors, or a database error.
pub async fn update_team(pool: &PgPool, team_id: Uuid, patch: &TeamPatch) -> Result<(), TeamError> {
    let name = patch.name.as_deref().map(validation::team_name).transpose()?;
    let charter = patch
        .charter
        .as_deref()
        .map(|raw| validation::optional_text("charter", "Charter", Some(raw), CHARTER_MAX))
        .transpose()?;
    let logo_url = patch
        .logo_url
        .as_deref()
        .map(|raw| validation::optional_url("logo_url", Some(raw)))
        .transpose()?;

    let result = sqlx::query(
        "UPDATE teams SET
             name = COALESCE($2, name),
             status = COALESCE($3, status),
             charter = CASE WHEN $4 THEN $5 ELSE charter END,
             logo_url = CASE WHEN $6 THEN $7 ELSE logo_url END,
             updated_at = now()
         WHERE id = $1",
    )
    .bind(team_id)
    .bind(name)
    .bind(patch.status.map(TeamStatus::as_str))
    .bind(charter.is_some())
    .bind(charter.flatten())
    .bind(logo_url.is_some())
    .bind(logo_url.flatten())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(TeamError::NotFound(team_id));
    }
    tracing::info!(%team_id, "team updated");
    Ok(())
}

/// Make an existing member the leader. The previous leader becomes a member.
///
/// # Errors
///
/// `NotFound` for an unknown team, `NotAMember` if the student is not on it.
pub async fn change_leader(pool: &PgPool, team_id: Uuid, student_id: Uuid) -> Result<(), TeamError> {
    let mut tx = pool.begin().await?;

    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM teams WHERE id = $1 FOR UPDATE")
        .bind(team_id)
        .fetch_optional(tx.as_mut())
        .await?;
    if exists.is_none() {
        return Err(TeamError::NotFound(team_id));
    }
    if !is_member(tx.as_mut(), team_id, student_id).await? {
        return Err(TeamError::NotAMember { team_id, student_id });
    }

    sqlx::query("UPDATE team_members SET role = $3 WHERE team_id = $1 AND student_id <> $2 AND role = $4")
        .bind(team_id)
        .bind(student_id)
        .bind(MEMBER_ROLE)
        .bind(LEADER_ROLE)
        .execute(tx.as_mut())
        .await?;
    sqlx::query("UPDATE team_members SET role = $3 WHERE team_id = $1 AND student_id = $2")
        .bind(team_id)
        .bind(student_id)
        .bind(LEADER_ROLE)
        .execute(tx.as_mut())
        .await?;
    sqlx::query("UPDATE teams SET leader_id = $2, updated_at = now() WHERE id = $1")
        .bind(team_id)
        .bind(student_id)
        .execute(tx.as_mut())
        .await?;

    tx.commit().await?;
    tracing::info!(%team_id, %student_id, "team leader changed");
    Ok(())
}

/// Set a member's free-text role label.
///
/// # Errors
///
/// `NotAMember` if the membership does not exist.
pub async fn update_member_role(pool: &PgPool, team_id: Uuid, student_id: Uuid, role: &str) -> Result<(), TeamError> {
    let role = validation::role(role)?;
    let result = sqlx::query("UPDATE team_members SET role = $3 WHERE team_id = $1 AND student_id = $2")
        .bind(team_id)
        .bind(student_id)
        .bind(&role)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(TeamError::NotAMember { team_id, student_id });
    }
    Ok(())
}

/// Remove a member. The student returns to `free`; a removed leader leaves
/// the team leaderless.
///
/// # Errors
///
/// `NotAMember` if the membership does not exist.
pub async fn remove_member(pool: &PgPool, team_id: Uuid, student_id: Uuid) -> Result<(), TeamError> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND student_id = $2")
        .bind(team_id)
        .bind(student_id)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(TeamError::NotAMember { team_id, student_id });
    }

    sqlx::query("UPDATE teams SET leader_id = NULL, updated_at = now() WHERE id = $1 AND leader_id = $2")
        .bind(team_id)
        .bind(student_id)
        .execute(tx.as_mut())
        .await?;
    student::set_status(tx.as_mut(), &[student_id], StudentStatus::Free).await?;

    tx.commit().await?;
    tracing::info!(%team_id, %student_id, "team member removed");
    Ok(())
}

/// Delete a team. Its members return to `free`.
///
/// # Errors
///
/// `NotFound` if no team matches.
pub async fn delete_team(pool: &PgPool, team_id: Uuid) -> Result<(), TeamError> {
    let mut tx = pool.begin().await?;

    let member_ids: Vec<Uuid> = sqlx::query_scalar("SELECT student_id FROM team_members WHERE team_id = $1")
        .bind(team_id)
        .fetch_all(tx.as_mut())
        .await?;

    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(team_id)
        .execute(tx.as_mut())
        .await?;
    if result.rows_affected() == 0 {
        return Err(TeamError::NotFound(team_id));
    }
    student::set_status(tx.as_mut(), &member_ids, StudentStatus::Free).await?;

    tx.commit().await?;
    tracing::info!(%team_id, released = member_ids.len(), "team deleted");
    Ok(())
}

async fn is_member(conn: &mut PgConnection, team_id: Uuid, student_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM team_members WHERE team_id = $1 AND student_id = $2)")
        .bind(team_id)
        .bind(student_id)
        .fetch_one(conn)
        .await
}

#[cfg(test)]
#[path = "team_test.rs"]
mod tests;
