use std::sync::Arc;

use cloudcost_agent::CostEstimatorAgent;
use cloudcost_core::config::{AppConfig, ConfigError, LoadOptions};
use cloudcost_mcp::{McpPricingCatalog, ServerCommand};
use cloudcost_slack::SocketModeRunner;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub estimator: Arc<CostEstimatorAgent>,
    pub pricing: Arc<McpPricingCatalog>,
    pub slack_runner: Option<SocketModeRunner>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("estimator wiring failed: {0}")]
    Estimator(anyhow::Error),
    #[error("slack wiring failed: {0}")]
    Slack(anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the estimator from configuration. The pricing server is not spawned
/// until the first task needs it.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let command = ServerCommand::from_config(&config.pricing, &config.cloud);
    info!(
        event_name = "system.bootstrap.pricing_configured",
        correlation_id = "bootstrap",
        command = %command.display(),
        "pricing server configured"
    );
    let pricing = Arc::new(McpPricingCatalog::new(command));

    let estimator = Arc::new(
        CostEstimatorAgent::from_config(&config, pricing.clone()).map_err(BootstrapError::Estimator)?,
    );
    info!(
        event_name = "system.bootstrap.estimator_ready",
        correlation_id = "bootstrap",
        provider = %config.model.provider,
        model = %config.model.model,
        region = %config.cloud.region,
        "estimator ready"
    );

    let slack_runner = if config.slack.enabled {
        Some(SocketModeRunner::from_config(&config.slack, estimator.clone()).map_err(BootstrapError::Slack)?)
    } else {
        None
    };

    Ok(Application { config, estimator, pricing, slack_runner })
}
