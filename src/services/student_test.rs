use super::*;

const DOMAIN: &str = "univ-tiaret.dz";

fn input(name: &str, email: &str) -> StudentInput {
    StudentInput { name: name.into(), university_email: email.into(), personal_email: None, status: None }
}

// =============================================================================
// StudentStatus
// =============================================================================

#[test]
fn status_round_trips_through_text() {
    for status in StudentStatus::ALL {
        assert_eq!(StudentStatus::from_str(status.as_str()), Some(status));
    }
    assert_eq!(StudentStatus::from_str("retired"), None);
}

#[test]
fn only_free_and_active_are_available() {
    let available: Vec<_> = StudentStatus::ALL.into_iter().filter(|s| s.is_available()).collect();
    assert_eq!(available, vec![StudentStatus::Free, StudentStatus::Active]);
}

#[test]
fn status_serializes_snake_case() {
    assert_eq!(serde_json::to_value(StudentStatus::TeamAssigned).unwrap(), "team_assigned");
    let parsed: StudentStatus = serde_json::from_str("\"graduated\"").unwrap();
    assert_eq!(parsed, StudentStatus::Graduated);
}

// =============================================================================
// validate_input
// =============================================================================

#[test]
fn validate_input_normalizes_fields() {
    let mut raw = input("  Amina Benali ", " Amina.B@Univ-Tiaret.dz ");
    raw.personal_email = Some("  ".into());
    let valid = validate_input(&raw, DOMAIN, StudentStatus::Free).unwrap();
    assert_eq!(valid.name, "Amina Benali");
    assert_eq!(valid.university_email, "amina.b@univ-tiaret.dz");
    assert_eq!(valid.personal_email, None);
    assert_eq!(valid.status, StudentStatus::Free);
}

#[test]
fn validate_input_keeps_explicit_status() {
    let mut raw = input("Karim", "karim@univ-tiaret.dz");
    raw.status = Some(StudentStatus::Busy);
    let valid = validate_input(&raw, DOMAIN, StudentStatus::Active).unwrap();
    assert_eq!(valid.status, StudentStatus::Busy);
}

#[test]
fn validate_input_rejects_foreign_domain() {
    let err = validate_input(&input("Karim", "karim@gmail.com"), DOMAIN, StudentStatus::Free).unwrap_err();
    assert_eq!(err.field, "university_email");
}

#[test]
fn validate_input_rejects_blank_name() {
    let err = validate_input(&input("   ", "x@univ-tiaret.dz"), DOMAIN, StudentStatus::Free).unwrap_err();
    assert_eq!(err.field, "name");
}

#[test]
fn validate_input_rejects_bad_personal_email() {
    let mut raw = input("Karim", "karim@univ-tiaret.dz");
    raw.personal_email = Some("not-an-email".into());
    let err = validate_input(&raw, DOMAIN, StudentStatus::Free).unwrap_err();
    assert_eq!(err.field, "personal_email");
}

#[test]
fn student_error_maps_to_status() {
    assert_eq!(StudentError::NotFound(Uuid::nil()).status(), StatusCode::NOT_FOUND);
    let validation = StudentError::from(ValidationError::new("name", "Name is required"));
    assert_eq!(validation.error_code(), "E_VALIDATION");
    assert_eq!(validation.to_string(), "Name is required");
}

#[tokio::test]
async fn register_rejects_invalid_input_before_touching_database() {
    let state = crate::state::test_helpers::test_app_state();
    let err = register_student(&state.pool, DOMAIN, &input("Karim", "karim@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, StudentError::Validation(_)));
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::db::test_support::{integration_pool, seed_student};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn register_forces_free_status() {
        let pool = integration_pool().await;
        let email = format!("{}@univ-tiaret.dz", Uuid::new_v4().simple());
        let mut raw = input("Self Registered", &email);
        raw.status = Some(StudentStatus::Graduated);
        let student = register_student(&pool, DOMAIN, &raw).await.unwrap();
        assert_eq!(student.status, StudentStatus::Free);
        assert!(!student.archived);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn update_clears_personal_email_and_archives() {
        let pool = integration_pool().await;
        let id = seed_student(&pool, "Patch Me", "active").await;
        sqlx::query("UPDATE students SET personal_email = 'old@gmail.com' WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let patch = StudentPatch { personal_email: Some(String::new()), archived: Some(true), ..Default::default() };
        let student = update_student(&pool, DOMAIN, id, &patch).await.unwrap();
        assert_eq!(student.personal_email, None);
        assert!(student.archived);
        assert_eq!(student.name, "Patch Me");

        let listed = list_students(&pool, &StudentFilter::default()).await.unwrap();
        assert!(listed.iter().all(|s| s.id != id));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn delete_missing_student_is_not_found() {
        let pool = integration_pool().await;
        let err = delete_student(&pool, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StudentError::NotFound(_)));
    }
}
