use std::time::Duration;

use servicehub::{app, config::AppConfig, db, state::UserState, users};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;
    app::init_tracing(&config);

    let state = UserState::init(config).await?;

    db::migrate(&state.db, sqlx::migrate!("./migrations/user"), "user").await?;

    let config = state.config.clone();
    let db = state.db.clone();
    let router = app::versioned(users::router()).with_state(state);
    let router = app::with_layers(router, &config.http.cors_origins);

    app::serve(
        router,
        &config.http.host,
        config.http.port,
        Duration::from_secs(config.server.shutdown_timeout_secs),
    )
    .await?;

    db.close().await;
    tracing::info!("user service stopped");
    Ok(())
}
