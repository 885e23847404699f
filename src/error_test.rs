use super::*;

// =============================================================================
// friendly_message
// =============================================================================

#[test]
fn known_codes_map_to_fixed_text() {
    assert_eq!(
        friendly_message(Some("23505"), "duplicate key value violates unique constraint \"students_email_key\""),
        "This record already exists. Please use a different value."
    );
    assert_eq!(
        friendly_message(Some("23503"), "whatever"),
        "Referenced record not found. Please check your selection."
    );
    assert_eq!(friendly_message(Some("PGRST301"), ""), "Access denied. Authentication required.");
}

#[test]
fn unknown_code_falls_back_to_message_hints() {
    assert_eq!(
        friendly_message(Some("XX999"), "new row violates row-level security policy"),
        "Access denied. You do not have permission to access this data."
    );
    assert_eq!(
        friendly_message(None, "insert violates Foreign Key constraint"),
        "Invalid reference. Please check your selection."
    );
}

#[test]
fn hints_are_checked_in_order() {
    // "unique constraint" wins over "duplicate" because it is listed first.
    assert_eq!(
        friendly_message(None, "duplicate value breaks unique constraint"),
        "This record already exists. Please use a different value."
    );
}

#[test]
fn unmatched_error_gets_generic_text() {
    assert_eq!(friendly_message(None, "relation \"students\" is on fire"), GENERIC_MESSAGE);
}

#[test]
fn friendly_message_never_echoes_raw_text() {
    let raw = "column secret_internal_column does not exist";
    assert!(!friendly_message(None, raw).contains("secret_internal_column"));
}

// =============================================================================
// db_status / ApiError
// =============================================================================

#[test]
fn db_status_maps_constraint_codes() {
    assert_eq!(db_status(Some("23505")), StatusCode::CONFLICT);
    assert_eq!(db_status(Some("23503")), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(db_status(Some("42501")), StatusCode::FORBIDDEN);
    assert_eq!(db_status(None), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn from_db_row_not_found_is_404() {
    let err = ApiError::from_db(&sqlx::Error::RowNotFound);
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.code, "E_DATABASE");
    assert_eq!(err.message, "The requested resource was not found.");
}

#[test]
fn from_db_pool_timeout_is_503() {
    let err = ApiError::from_db(&sqlx::Error::PoolTimedOut);
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[derive(Debug, thiserror::Error)]
#[error("widget is broken")]
struct BrokenWidget;

impl ErrorCode for BrokenWidget {
    fn error_code(&self) -> &'static str {
        "E_WIDGET"
    }

    fn status(&self) -> StatusCode {
        StatusCode::CONFLICT
    }
}

#[test]
fn domain_error_converts_with_display_text() {
    let err: ApiError = BrokenWidget.into();
    assert_eq!(err.status, StatusCode::CONFLICT);
    assert_eq!(err.code, "E_WIDGET");
    assert_eq!(err.message, "widget is broken");
}

#[test]
fn api_error_response_carries_status() {
    let response = ApiError::forbidden().into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
