use std::sync::Arc;

use cloudcost_agent::{CostEstimatorAgent, EstimationService};
use cloudcost_core::config::{AppConfig, LoadOptions};
use cloudcost_core::{Response, ResponseOutcome, Task};
use cloudcost_mcp::{McpPricingCatalog, ServerCommand};

use super::{build_runtime, init_logging, CommandResult};

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_ESTIMATION_FAILED: u8 = 3;

pub fn run(description: &str) -> CommandResult {
    let description = description.trim();
    if description.is_empty() {
        return CommandResult::failure(
            "estimate",
            "invalid_input",
            "an architecture description is required",
            EXIT_CONFIG,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("estimate", "config_validation", error.to_string(), EXIT_CONFIG);
        }
    };
    init_logging(&config);

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "estimate",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_ESTIMATION_FAILED,
            );
        }
    };

    runtime.block_on(estimate_with_config(&config, description))
}

/// One task against the configured providers; the pricing server is stopped
/// before returning.
pub async fn estimate_with_config(config: &AppConfig, description: &str) -> CommandResult {
    let pricing = Arc::new(McpPricingCatalog::new(ServerCommand::from_config(&config.pricing, &config.cloud)));
    let agent = match CostEstimatorAgent::from_config(config, pricing.clone()) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure("estimate", "wiring", error.to_string(), EXIT_CONFIG);
        }
    };

    let response = estimate(&agent, description).await;
    pricing.shutdown().await;

    render(response)
}

pub async fn estimate(service: &dyn EstimationService, description: &str) -> Response {
    service.estimate(&Task::new(description)).await
}

fn render(response: Response) -> CommandResult {
    let exit_code = match response.outcome {
        ResponseOutcome::Failed => EXIT_ESTIMATION_FAILED,
        ResponseOutcome::Answered | ResponseOutcome::NoResult => 0,
    };
    CommandResult::text(exit_code, response.into_text())
}
