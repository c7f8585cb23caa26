mod app;
mod bootstrap;
mod gateway;
mod health;
mod invocations;

use std::time::Duration;

use anyhow::Result;
use cloudcost_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

use crate::app::AppState;
use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use cloudcost_core::config::LogFormat::*;
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
    // Logging comes up before bootstrap so wiring failures are reported.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let router = app::router(AppState::new(app.estimator.clone()), HealthState::from_config(&app.config));

    let slack_task = app.slack_runner.map(|runner| {
        tokio::spawn(async move {
            if let Err(error) = runner.start().await {
                warn!(event_name = "system.slack.stopped", error = %error, "slack runner stopped");
            }
        })
    });
    info!(
        event_name = "system.server.slack_transport_mode",
        correlation_id = "bootstrap",
        transport_mode = if slack_task.is_some() { "socket" } else { "disabled" },
        "slack runner transport mode initialized"
    );

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.changed().await;
            })
            .await
    });
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "cloudcost-server listening"
    );

    wait_for_shutdown().await?;
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "cloudcost-server stopping");
    let _ = stop_tx.send(true);

    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(drain, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            drain_secs = drain.as_secs(),
            "in-flight requests did not finish before the shutdown deadline"
        ),
    }

    if let Some(task) = slack_task {
        task.abort();
    }
    app.pricing.shutdown().await;

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
