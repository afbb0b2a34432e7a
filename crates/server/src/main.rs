mod api;
mod bootstrap;
mod health;
mod webhook;

use anyhow::Result;
use axum::Router;
use crosstalk_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use crosstalk_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let webhook_state = webhook::WebhookState {
        db_pool: app.db_pool.clone(),
        vapi: app.config.vapi.clone(),
        call_mode: app.config.server.call_mode,
    };

    let router = Router::new()
        .merge(health::router(app.db_pool.clone()))
        .merge(api::router(app.db_pool.clone()))
        .merge(webhook::router(webhook_state));

    let bind_address =
        format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!(
        event_name = "system.server.started",
        address = %bind_address,
        call_mode = ?app.config.server.call_mode,
        "crosstalk-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "crosstalk-server stopping");

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
