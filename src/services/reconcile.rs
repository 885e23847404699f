//! Duplicate student reconciliation.
//!
//! DESIGN
//! ======
//! Grouping is a pure pass over students in creation order: each ungrouped
//! student opens a group and pulls in every later ungrouped student whose
//! normalized name or university e-mail matches the group's first member.
//! Matching never chains through later members.
//!
//! Merging keeps the earliest row, repoints every dependent row at it, and
//! deletes the rest. Each group commits on its own, so one bad group does not
//! block the others.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Tables whose `student_id` is repointed at the kept row.
pub const DEPENDENT_TABLES: [&str; 6] = [
    "team_members",
    "requests",
    "student_metrics",
    "student_reflections",
    "student_action_plans",
    "metric_history",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentIdentity {
    pub id: Uuid,
    pub name: String,
    pub university_email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub keep: StudentIdentity,
    pub duplicates: Vec<StudentIdentity>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub duplicates_found: usize,
    pub duplicates_removed: u64,
    pub groups_failed: usize,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn email_key(email: &str) -> Option<String> {
    let key = email.trim().to_lowercase();
    (!key.is_empty()).then_some(key)
}

fn is_duplicate_of(first: &StudentIdentity, candidate: &StudentIdentity) -> bool {
    if name_key(&first.name) == name_key(&candidate.name) {
        return true;
    }
    matches!(
        (email_key(&first.university_email), email_key(&candidate.university_email)),
        (Some(a), Some(b)) if a == b
    )
}

/// Group students, given oldest first. Only groups with duplicates are
/// returned.
#[must_use]
pub fn find_duplicate_groups(students: &[StudentIdentity]) -> Vec<DuplicateGroup> {
    let mut grouped: HashSet<Uuid> = HashSet::new();
    let mut groups = Vec::new();

    for (i, first) in students.iter().enumerate() {
        if grouped.contains(&first.id) {
            continue;
        }
        grouped.insert(first.id);

        let mut duplicates = Vec::new();
        for candidate in &students[i + 1..] {
            if !grouped.contains(&candidate.id) && is_duplicate_of(first, candidate) {
                grouped.insert(candidate.id);
                duplicates.push(candidate.clone());
            }
        }
        if !duplicates.is_empty() {
            groups.push(DuplicateGroup { keep: first.clone(), duplicates });
        }
    }
    groups
}

/// Σ(|group| − 1).
#[must_use]
pub fn count_duplicates(groups: &[DuplicateGroup]) -> usize {
    groups.iter().map(|g| g.duplicates.len()).sum()
}

async fn load_identities(pool: &PgPool) -> Result<Vec<StudentIdentity>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, String)>(
        r#"SELECT id, name, university_email,
                  to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
           FROM students
           ORDER BY created_at, id"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name, university_email, created_at)| StudentIdentity { id, name, university_email, created_at })
        .collect())
}

/// Duplicate groups as they stand, without changing anything.
///
/// # Errors
///
/// Returns a database error if loading students fails.
pub async fn preview_duplicates(pool: &PgPool) -> Result<Vec<DuplicateGroup>, sqlx::Error> {
    Ok(find_duplicate_groups(&load_identities(pool).await?))
}

/// Merge every duplicate group. Failing groups are logged and skipped.
///
/// # Errors
///
/// Returns a database error only if loading students fails.
pub async fn merge_duplicates(pool: &PgPool) -> Result<MergeReport, sqlx::Error> {
    let groups = preview_duplicates(pool).await?;
    let mut report = MergeReport { duplicates_found: count_duplicates(&groups), ..MergeReport::default() };

    for group in &groups {
        match merge_group(pool, group).await {
            Ok(removed) => report.duplicates_removed += removed,
            Err(e) => {
                report.groups_failed += 1;
                tracing::error!(error = %e, keep = %group.keep.id, "duplicate merge failed; group skipped");
            }
        }
    }

    tracing::info!(
        found = report.duplicates_found,
        removed = report.duplicates_removed,
        failed = report.groups_failed,
        "duplicate merge complete"
    );
    Ok(report)
}

async fn merge_group(pool: &PgPool, group: &DuplicateGroup) -> Result<u64, sqlx::Error> {
    let keep = group.keep.id;
    let dups: Vec<Uuid> = group.duplicates.iter().map(|d| d.id).collect();

    let mut tx = pool.begin().await?;

    // One metrics row per student: prefer the kept one, else the freshest.
    sqlx::query(
        "DELETE FROM student_metrics WHERE student_id = ANY($2) AND id <> (
             SELECT id FROM student_metrics
             WHERE student_id = $1 OR student_id = ANY($2)
             ORDER BY (student_id = $1) DESC, updated_at DESC
             LIMIT 1)",
    )
    .bind(keep)
    .bind(&dups)
    .execute(tx.as_mut())
    .await?;

    // One membership per team: prefer the kept one, else the earliest.
    sqlx::query(
        "DELETE FROM team_members tm WHERE tm.student_id = ANY($2) AND tm.id <> (
             SELECT x.id FROM team_members x
             WHERE x.team_id = tm.team_id AND (x.student_id = $1 OR x.student_id = ANY($2))
             ORDER BY (x.student_id = $1) DESC, x.joined_at
             LIMIT 1)",
    )
    .bind(keep)
    .bind(&dups)
    .execute(tx.as_mut())
    .await?;

    for table in DEPENDENT_TABLES {
        let sql = format!("UPDATE {table} SET student_id = $1 WHERE student_id = ANY($2)");
        sqlx::query(&sql).bind(keep).bind(&dups).execute(tx.as_mut()).await?;
    }
    sqlx::query("UPDATE teams SET leader_id = $1 WHERE leader_id = ANY($2)")
        .bind(keep)
        .bind(&dups)
        .execute(tx.as_mut())
        .await?;

    let removed = sqlx::query("DELETE FROM students WHERE id = ANY($1)")
        .bind(&dups)
        .execute(tx.as_mut())
        .await?
        .rows_affected();

    tx.commit().await?;
    tracing::debug!(%keep, removed, "duplicate group merged");
    Ok(removed)
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
