mod app;
mod auth;
mod config;
mod db;
mod drinks;
mod error;
mod state;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "coffeeshop=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        storage = ?config.storage,
        jwks = %config.auth.jwks_url,
        audience = %config.auth.audience,
        "starting"
    );

    let app_state = AppState::init(&config).await?;
    let db = app_state.db.clone();

    app::serve(app::build_app(app_state)).await?;

    if let Some(db) = db {
        db.close().await;
        tracing::info!("database pool closed");
    }
    Ok(())
}
