use super::*;

#[test]
fn open_slots_floors_at_zero() {
    assert_eq!(open_slots(0, 5), 5);
    assert_eq!(open_slots(3, 5), 2);
    assert_eq!(open_slots(5, 5), 0);
    assert_eq!(open_slots(7, 5), 0);
}

#[test]
fn team_status_parses_known_values() {
    assert_eq!(TeamStatus::from_str("active"), Some(TeamStatus::Active));
    assert_eq!(TeamStatus::from_str("inactive"), Some(TeamStatus::Inactive));
    assert_eq!(TeamStatus::from_str("archived"), None);
    assert_eq!(TeamStatus::Inactive.as_str(), "inactive");
}

#[test]
fn filter_defaults_to_no_status() {
    let filter: TeamFilter = serde_json::from_str("{}").unwrap();
    assert!(filter.status.is_none());
}

#[test]
fn not_a_member_is_404() {
    let err = TeamError::NotAMember { team_id: Uuid::nil(), student_id: Uuid::nil() };
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    assert_eq!(err.error_code(), "E_NOT_A_MEMBER");
}

#[tokio::test]
async fn update_team_validates_name_before_touching_database() {
    let state = crate::state::test_helpers::test_app_state();
    let patch = TeamPatch { name: Some("Team <script>".into()), ..Default::default() };
    let err = update_team(&state.pool, Uuid::new_v4(), &patch).await.unwrap_err();
    assert!(matches!(err, TeamError::Validation(ref v) if v.field == "team_name"));
}

#[tokio::test]
async fn update_team_rejects_non_http_logo() {
    let state = crate::state::test_helpers::test_app_state();
    let patch = TeamPatch { logo_url: Some("ftp://example.com/logo.png".into()), ..Default::default() };
    let err = update_team(&state.pool, Uuid::new_v4(), &patch).await.unwrap_err();
    assert!(matches!(err, TeamError::Validation(ref v) if v.field == "logo_url"));
}

#[tokio::test]
async fn update_member_role_rejects_blank_role() {
    let state = crate::state::test_helpers::test_app_state();
    let err = update_member_role(&state.pool, Uuid::new_v4(), Uuid::new_v4(), "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, TeamError::Validation(_)));
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::db::test_support::{integration_pool, seed_student, seed_team, student_status};

    async fn add_member(pool: &PgPool, team_id: Uuid, student_id: Uuid) {
        sqlx::query("INSERT INTO team_members (team_id, student_id, role) VALUES ($1, $2, 'Member')")
            .bind(team_id)
            .bind(student_id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn get_team_reports_roster_and_slots() {
        let pool = integration_pool().await;
        let leader = seed_student(&pool, "Leader", "team_assigned").await;
        let member = seed_student(&pool, "Member", "team_assigned").await;
        let team_id = seed_team(&pool, "Roster Team", leader).await;
        add_member(&pool, team_id, member).await;

        let team = get_team(&pool, team_id, 5).await.unwrap();
        assert_eq!(team.member_count, 2);
        assert_eq!(team.open_slots, 3);
        assert_eq!(team.leader.map(|l| l.id), Some(leader));
        assert_eq!(team.pending_requests, 0);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn change_leader_swaps_roles() {
        let pool = integration_pool().await;
        let leader = seed_student(&pool, "Old Leader", "team_assigned").await;
        let member = seed_student(&pool, "New Leader", "team_assigned").await;
        let team_id = seed_team(&pool, "Leader Swap", leader).await;
        add_member(&pool, team_id, member).await;

        change_leader(&pool, team_id, member).await.unwrap();

        let team = get_team(&pool, team_id, 5).await.unwrap();
        assert_eq!(team.leader.map(|l| l.id), Some(member));
        let role_of = |id: Uuid| team.members.iter().find(|m| m.student_id == id).and_then(|m| m.role.clone());
        assert_eq!(role_of(member).as_deref(), Some(LEADER_ROLE));
        assert_eq!(role_of(leader).as_deref(), Some(MEMBER_ROLE));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn change_leader_rejects_outsider() {
        let pool = integration_pool().await;
        let leader = seed_student(&pool, "Leader", "team_assigned").await;
        let outsider = seed_student(&pool, "Outsider", "free").await;
        let team_id = seed_team(&pool, "Closed Team", leader).await;

        let err = change_leader(&pool, team_id, outsider).await.unwrap_err();
        assert!(matches!(err, TeamError::NotAMember { .. }));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn remove_leader_frees_student_and_clears_leader() {
        let pool = integration_pool().await;
        let leader = seed_student(&pool, "Leaving Leader", "team_assigned").await;
        let team_id = seed_team(&pool, "Leaderless", leader).await;

        remove_member(&pool, team_id, leader).await.unwrap();

        assert_eq!(student_status(&pool, leader).await, "free");
        let team = get_team(&pool, team_id, 5).await.unwrap();
        assert!(team.leader.is_none());
        assert_eq!(team.member_count, 0);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn delete_team_frees_members() {
        let pool = integration_pool().await;
        let leader = seed_student(&pool, "Leader", "team_assigned").await;
        let member = seed_student(&pool, "Member", "team_assigned").await;
        let team_id = seed_team(&pool, "Doomed", leader).await;
        add_member(&pool, team_id, member).await;

        delete_team(&pool, team_id).await.unwrap();

        assert_eq!(student_status(&pool, leader).await, "free");
        assert_eq!(student_status(&pool, member).await, "free");
        assert!(matches!(get_team(&pool, team_id, 5).await, Err(TeamError::NotFound(_))));
    }
}
