use std::time::Duration;

use servicehub::{app, chat, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;
    app::init_tracing(&config);

    let router = app::with_layers(app::versioned(chat::router()), &config.http.cors_origins);
    app::serve(
        router,
        &config.http.host,
        config.http.port,
        Duration::from_secs(config.server.shutdown_timeout_secs),
    )
    .await?;

    tracing::info!("chat service stopped");
    Ok(())
}
