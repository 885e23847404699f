use super::*;

#[test]
fn sweep_interval_defaults_to_an_hour() {
    unsafe { std::env::remove_var("SESSION_SWEEP_INTERVAL_SECS") };
    assert_eq!(sweep_interval(), Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));
}

#[tokio::test]
async fn sweeper_can_be_aborted() {
    let state = crate::state::test_helpers::test_app_state();
    let handle = spawn_session_sweeper(state.pool.clone(), Duration::from_secs(3600));
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}
