use super::*;

// =============================================================================
// env_parse / env_bool: unique keys to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__TEST_TH_MISSING_KEY_4411__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_invalid_returns_default() {
    unsafe { std::env::set_var("__TEST_TH_EP_INVALID__", "lots") };
    let val: i64 = env_parse("__TEST_TH_EP_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__TEST_TH_EP_INVALID__") };
}

#[test]
fn env_parse_strict_rejects_malformed_value() {
    unsafe { std::env::set_var("__TEST_TH_STRICT_BAD__", "abc") };
    let result: Result<u16, _> = env_parse_strict("__TEST_TH_STRICT_BAD__", 1);
    assert!(matches!(result, Err(ConfigError::Invalid { key: "__TEST_TH_STRICT_BAD__", .. })));
    unsafe { std::env::remove_var("__TEST_TH_STRICT_BAD__") };
}

#[test]
fn env_parse_strict_trims_whitespace() {
    unsafe { std::env::set_var("__TEST_TH_STRICT_WS__", " 8080 ") };
    let result: Result<u16, _> = env_parse_strict("__TEST_TH_STRICT_WS__", 1);
    assert_eq!(result.unwrap(), 8080);
    unsafe { std::env::remove_var("__TEST_TH_STRICT_WS__") };
}

#[test]
fn env_bool_true_and_false_variants() {
    for (i, (val, expected)) in [("1", true), ("YES", true), ("off", false), ("False", false)]
        .iter()
        .enumerate()
    {
        let key = format!("__TEST_TH_EB_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(*expected), "value {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_garbage_returns_none() {
    unsafe { std::env::set_var("__TEST_TH_EB_GARBAGE__", "sometimes") };
    assert_eq!(env_bool("__TEST_TH_EB_GARBAGE__"), None);
    unsafe { std::env::remove_var("__TEST_TH_EB_GARBAGE__") };
}

// =============================================================================
// parse_domain
// =============================================================================

#[test]
fn parse_domain_defaults_when_absent() {
    assert_eq!(parse_domain(None).unwrap(), DEFAULT_UNIVERSITY_EMAIL_DOMAIN);
}

#[test]
fn parse_domain_strips_at_and_lowercases() {
    assert_eq!(parse_domain(Some("@Example.EDU")).unwrap(), "example.edu");
}

#[test]
fn parse_domain_rejects_bare_word() {
    assert!(parse_domain(Some("localhost")).is_err());
    assert!(parse_domain(Some("  ")).is_err());
    assert!(parse_domain(Some("a@b.c")).is_err());
}
