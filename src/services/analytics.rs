//! Cohort analytics for the admin dashboard.
//!
//! One query loads a row per unarchived student (SRL score and first team, if
//! any); [`compute_analytics`] does the rest in memory.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

pub const TOP_PERFORMER_MIN: i32 = 80;
pub const AT_RISK_BELOW: i32 = 50;
pub const HIGHLIGHT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsRow {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub srl_score: Option<i32>,
    pub team_id: Option<Uuid>,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredStudent {
    pub id: Uuid,
    pub name: String,
    pub srl_score: i32,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamScore {
    pub team_id: Uuid,
    pub team_name: String,
    pub average_srl_score: f64,
    pub scored_members: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub total_students: usize,
    pub average_srl_score: i64,
    pub top_performers: Vec<ScoredStudent>,
    pub at_risk: Vec<ScoredStudent>,
    pub team_comparison: Vec<TeamScore>,
    pub status_counts: BTreeMap<String, usize>,
}

/// Aggregate per-student rows into dashboard figures.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn compute_analytics(rows: &[AnalyticsRow]) -> Analytics {
    let scored: Vec<ScoredStudent> = rows
        .iter()
        .filter_map(|row| {
            row.srl_score.map(|srl_score| ScoredStudent {
                id: row.id,
                name: row.name.clone(),
                srl_score,
                team_name: row.team_name.clone(),
            })
        })
        .collect();

    let average_srl_score = if scored.is_empty() {
        0
    } else {
        let sum: i64 = scored.iter().map(|s| i64::from(s.srl_score)).sum();
        (sum as f64 / scored.len() as f64).round() as i64
    };

    let mut top_performers: Vec<ScoredStudent> =
        scored.iter().filter(|s| s.srl_score >= TOP_PERFORMER_MIN).cloned().collect();
    top_performers.sort_by(|a, b| b.srl_score.cmp(&a.srl_score).then_with(|| a.name.cmp(&b.name)));
    top_performers.truncate(HIGHLIGHT_LIMIT);

    let mut at_risk: Vec<ScoredStudent> = scored.iter().filter(|s| s.srl_score < AT_RISK_BELOW).cloned().collect();
    at_risk.sort_by(|a, b| a.srl_score.cmp(&b.srl_score).then_with(|| a.name.cmp(&b.name)));
    at_risk.truncate(HIGHLIGHT_LIMIT);

    let mut by_team: HashMap<Uuid, (String, i64, usize)> = HashMap::new();
    for row in rows {
        if let (Some(team_id), Some(team_name), Some(score)) = (row.team_id, &row.team_name, row.srl_score) {
            let entry = by_team.entry(team_id).or_insert_with(|| (team_name.clone(), 0, 0));
            entry.1 += i64::from(score);
            entry.2 += 1;
        }
    }
    let mut team_comparison: Vec<TeamScore> = by_team
        .into_iter()
        .map(|(team_id, (team_name, sum, count))| TeamScore {
            team_id,
            team_name,
            average_srl_score: (sum as f64 / count as f64 * 10.0).round() / 10.0,
            scored_members: count,
        })
        .collect();
    team_comparison.sort_by(|a, b| {
        b.average_srl_score
            .total_cmp(&a.average_srl_score)
            .then_with(|| a.team_name.cmp(&b.team_name))
    });

    let mut status_counts = BTreeMap::new();
    for row in rows {
        *status_counts.entry(row.status.clone()).or_insert(0) += 1;
    }

    Analytics {
        total_students: rows.len(),
        average_srl_score,
        top_performers,
        at_risk,
        team_comparison,
        status_counts,
    }
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn load_analytics(pool: &PgPool) -> Result<Analytics, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, Option<i32>, Option<Uuid>, Option<String>)>(
        "SELECT s.id, s.name, s.status, m.srl_score, team.id, team.name
         FROM students s
         LEFT JOIN student_metrics m ON m.student_id = s.id
         LEFT JOIN LATERAL (
             SELECT t.id, t.name
             FROM team_members tm
             JOIN teams t ON t.id = tm.team_id
             WHERE tm.student_id = s.id
             ORDER BY tm.joined_at
             LIMIT 1
         ) team ON true
         WHERE NOT s.archived",
    )
    .fetch_all(pool)
    .await?;

    let rows: Vec<AnalyticsRow> = rows
        .into_iter()
        .map(|(id, name, status, srl_score, team_id, team_name)| AnalyticsRow {
            id,
            name,
            status,
            srl_score,
            team_id,
            team_name,
        })
        .collect();
    Ok(compute_analytics(&rows))
}

#[cfg(test)]
#[path = "analytics_test.rs"]
mod tests;
