use super::*;

#[test]
fn toggle_flips_completed_and_pending() {
    assert_eq!(ActionPlanStatus::Completed.toggled(), ActionPlanStatus::Pending);
    assert_eq!(ActionPlanStatus::Pending.toggled(), ActionPlanStatus::Completed);
    assert_eq!(ActionPlanStatus::InProgress.toggled(), ActionPlanStatus::Completed);
    assert_eq!(ActionPlanStatus::Cancelled.toggled(), ActionPlanStatus::Completed);
}

#[test]
fn plan_status_text_round_trip() {
    for status in [
        ActionPlanStatus::Pending,
        ActionPlanStatus::InProgress,
        ActionPlanStatus::Completed,
        ActionPlanStatus::Cancelled,
    ] {
        assert_eq!(ActionPlanStatus::from_str(status.as_str()), Some(status));
    }
    let parsed: ActionPlanStatusUpdate = serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
    assert_eq!(parsed.status, ActionPlanStatus::InProgress);
}

#[test]
fn reflection_limit_is_clamped() {
    assert_eq!(reflection_limit(None), 50);
    assert_eq!(reflection_limit(Some(0)), 1);
    assert_eq!(reflection_limit(Some(10)), 10);
    assert_eq!(reflection_limit(Some(10_000)), 200);
}

#[tokio::test]
async fn empty_reflection_is_rejected() {
    let state = crate::state::test_helpers::test_app_state();
    let input = NewReflection { reflection_text: "   ".into(), milestone: None };
    let err = add_reflection(&state.pool, Uuid::new_v4(), &input).await.unwrap_err();
    assert!(matches!(err, JournalError::Validation(ref v) if v.field == "reflection_text"));
}

#[tokio::test]
async fn overlong_reflection_is_rejected() {
    let state = crate::state::test_helpers::test_app_state();
    let input = NewReflection { reflection_text: "a".repeat(REFLECTION_MAX + 1), milestone: None };
    let err = add_reflection(&state.pool, Uuid::new_v4(), &input).await.unwrap_err();
    assert!(matches!(err, JournalError::Validation(_)));
}

#[tokio::test]
async fn overlong_milestone_is_rejected() {
    let state = crate::state::test_helpers::test_app_state();
    let input = NewReflection { reflection_text: "Week 3".into(), milestone: Some("m".repeat(MILESTONE_MAX + 1)) };
    let err = add_reflection(&state.pool, Uuid::new_v4(), &input).await.unwrap_err();
    assert!(matches!(err, JournalError::Validation(ref v) if v.field == "milestone"));
}

#[tokio::test]
async fn action_plan_with_bad_deadline_is_rejected() {
    let state = crate::state::test_helpers::test_app_state();
    let input = NewActionPlan {
        task_title: "Finish prototype".into(),
        description: None,
        deadline: Some("2024-02-30".into()),
        owner: None,
    };
    let err = create_action_plan(&state.pool, Uuid::new_v4(), &input).await.unwrap_err();
    assert!(matches!(err, JournalError::Validation(ref v) if v.field == "deadline"));
}

#[tokio::test]
async fn action_plan_title_is_required() {
    let state = crate::state::test_helpers::test_app_state();
    let input = NewActionPlan { task_title: String::new(), description: None, deadline: None, owner: None };
    let err = create_action_plan(&state.pool, Uuid::new_v4(), &input).await.unwrap_err();
    assert!(matches!(err, JournalError::Validation(ref v) if v.field == "task_title"));
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::db::test_support::{integration_pool, seed_student};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn action_plans_order_by_deadline_and_toggle() {
        let pool = integration_pool().await;
        let id = seed_student(&pool, "Planner", "active").await;
        let plan = |title: &str, deadline: Option<&str>| NewActionPlan {
            task_title: title.into(),
            description: None,
            deadline: deadline.map(Into::into),
            owner: Some("Mentor".into()),
        };

        create_action_plan(&pool, id, &plan("undated", None)).await.unwrap();
        create_action_plan(&pool, id, &plan("late", Some("2030-06-01"))).await.unwrap();
        let early = create_action_plan(&pool, id, &plan("early", Some("2030-01-15"))).await.unwrap();
        assert_eq!(early.deadline.as_deref(), Some("2030-01-15"));

        let titles: Vec<_> = list_action_plans(&pool, id).await.unwrap().into_iter().map(|p| p.task_title).collect();
        assert_eq!(titles, vec!["early", "late", "undated"]);

        let done = toggle_action_plan(&pool, early.id).await.unwrap();
        assert_eq!(done.status, ActionPlanStatus::Completed);
        let reopened = toggle_action_plan(&pool, early.id).await.unwrap();
        assert_eq!(reopened.status, ActionPlanStatus::Pending);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn reflection_for_unknown_student_is_not_found() {
        let pool = integration_pool().await;
        let input = NewReflection { reflection_text: "hello".into(), milestone: None };
        let err = add_reflection(&pool, Uuid::new_v4(), &input).await.unwrap_err();
        assert!(matches!(err, JournalError::StudentNotFound(_)));
    }
}
