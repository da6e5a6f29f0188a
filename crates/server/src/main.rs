mod bootstrap;
mod health;

use std::sync::Arc;

use anyhow::Result;
use docbot_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use docbot_core::config::LogFormat::*;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before bootstrap so its events are captured
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            dispatcher: Arc::clone(&app.dispatcher),
            graphs: Arc::clone(&app.graphs),
            mdn_index: Arc::clone(&app.mdn_index),
            gateway: app.gateway_runner.status(),
        },
    )
    .await?;

    let mdn_index = Arc::clone(&app.mdn_index);
    tokio::spawn(async move {
        mdn_index.get_index().await;
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        application_id = %app.config.discord.application_id,
        "docbot-server started"
    );

    tokio::select! {
        outcome = app.gateway_runner.start() => {
            outcome?;
            tracing::warn!(
                event_name = "system.server.gateway_stopped",
                correlation_id = "runtime",
                "discord gateway stream closed; waiting for shutdown signal"
            );
            wait_for_shutdown().await?;
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "docbot-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
