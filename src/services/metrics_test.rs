use super::*;

fn scores(value: i32) -> SkillMetrics {
    SkillMetrics {
        technical_skills: value,
        collaboration: value,
        adaptability: value,
        consistency: value,
        problem_solving: value,
        srl_score: value,
    }
}

#[test]
fn bounds_are_inclusive() {
    assert!(scores(0).validate().is_ok());
    assert!(scores(100).validate().is_ok());
}

#[test]
fn out_of_range_score_names_field() {
    let mut metrics = scores(50);
    metrics.consistency = 101;
    assert_eq!(metrics.validate().unwrap_err().field, "consistency");

    let mut metrics = scores(50);
    metrics.srl_score = -1;
    assert_eq!(metrics.validate().unwrap_err().field, "srl_score");
}

#[test]
fn student_metrics_serialize_flat() {
    let metrics = StudentMetrics { student_id: Uuid::nil(), scores: scores(70), updated_at: "2024-05-01T00:00:00Z".into() };
    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["srl_score"], 70);
    assert_eq!(json["technical_skills"], 70);
    assert!(json.get("scores").is_none());
}

#[test]
fn skill_metrics_require_every_score() {
    let partial = serde_json::json!({ "technical_skills": 10 });
    assert!(serde_json::from_value::<SkillMetrics>(partial).is_err());
}

#[tokio::test]
async fn set_metrics_rejects_invalid_scores_before_touching_database() {
    let state = crate::state::test_helpers::test_app_state();
    let err = set_metrics(&state.pool, Uuid::new_v4(), &scores(150)).await.unwrap_err();
    assert!(matches!(err, MetricsError::Validation(_)));
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::db::test_support::{integration_pool, seed_student};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn set_metrics_upserts_and_records_history() {
        let pool = integration_pool().await;
        let id = seed_student(&pool, "Scored", "active").await;

        set_metrics(&pool, id, &scores(40)).await.unwrap();
        set_metrics(&pool, id, &scores(85)).await.unwrap();

        let current = get_metrics(&pool, id).await.unwrap().unwrap();
        assert_eq!(current.scores.srl_score, 85);

        let history = metric_history(&pool, id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].scores.srl_score, 40);
        assert_eq!(history[1].scores.srl_score, 85);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn set_metrics_for_unknown_student_is_not_found() {
        let pool = integration_pool().await;
        let err = set_metrics(&pool, Uuid::new_v4(), &scores(10)).await.unwrap_err();
        assert!(matches!(err, MetricsError::StudentNotFound(_)));
    }
}
