mod config;
mod db;
mod error;
mod routes;
mod services;
mod state;
mod validation;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("database init failed");

    if let Some(admin) = &config.bootstrap_admin {
        match services::auth::upsert_admin(&pool, &admin.email, &admin.password).await {
            Ok(user_id) => tracing::info!(%user_id, email = %admin.email, "bootstrap admin ready"),
            Err(e) => tracing::error!(error = %e, email = %admin.email, "bootstrap admin failed"),
        }
    }

    // Spawn background session sweep.
    let _sweeper = services::housekeeping::spawn_session_sweeper(pool.clone(), services::housekeeping::sweep_interval());

    let state = state::AppState::new(pool, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "teamhub listening");
    axum::serve(listener, app).await.expect("server failed");
}
