//! Pricing lookups reached through tools discovered at task setup.

use std::sync::Arc;

use async_trait::async_trait;
use cloudcost_core::{PriceLookup, PriceQuery, PriceRecord, ToolExecutionError};
use serde_json::{json, Value};
use tracing::info;

use crate::llm::ToolDescriptor;
use crate::tools::Tool;

pub const STATIC_PRICING_TOOL: &str = "get_pricing";

/// A source of pricing tools: enumerated once per task, then invoked by name.
#[async_trait]
pub trait PricingCatalog: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolExecutionError>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolExecutionError>;
}

/// One discovered catalog tool, callable by the model.
pub struct PricingTool {
    catalog: Arc<dyn PricingCatalog>,
    descriptor: ToolDescriptor,
}

#[async_trait]
impl Tool for PricingTool {
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn invoke(&self, input: Value) -> Result<String, ToolExecutionError> {
        self.catalog.call_tool(&self.descriptor.name, input).await
    }
}

pub async fn discover_pricing_tools(
    catalog: Arc<dyn PricingCatalog>,
) -> Result<Vec<PricingTool>, ToolExecutionError> {
    let descriptors = catalog.list_tools().await?;
    info!(event_name = "pricing.discovered", tools = descriptors.len(), "pricing tools discovered");

    Ok(descriptors
        .into_iter()
        .map(|descriptor| PricingTool { catalog: Arc::clone(&catalog), descriptor })
        .collect())
}

/// In-process price table exposing a single `get_pricing` tool.
#[derive(Clone, Debug, Default)]
pub struct StaticPriceCatalog {
    records: Vec<PriceRecord>,
}

impl StaticPriceCatalog {
    pub fn new(records: Vec<PriceRecord>) -> Self {
        Self { records }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    /// First record that satisfies the query.
    pub fn lookup(&self, query: &PriceQuery) -> PriceLookup {
        self.records
            .iter()
            .find(|record| record.satisfies(query))
            .map(|record| PriceLookup::Found { record: record.clone() })
            .unwrap_or_else(|| PriceLookup::NotFound { query: query.clone() })
    }
}

#[async_trait]
impl PricingCatalog for StaticPriceCatalog {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolExecutionError> {
        Ok(vec![ToolDescriptor {
            name: STATIC_PRICING_TOOL.to_owned(),
            description: "Get the unit price of a cloud service in a region. Filters match \
                          product attributes such as instanceType or storageClass."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "service_code": {"type": "string", "description": "Service code, e.g. AmazonS3"},
                    "region": {"type": "string", "description": "Region code, e.g. us-east-1"},
                    "filters": {
                        "type": "object",
                        "additionalProperties": {"type": "string"}
                    }
                },
                "required": ["service_code", "region"]
            }),
        }])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ToolExecutionError> {
        if name != STATIC_PRICING_TOOL {
            return Err(ToolExecutionError::UnknownTool(name.to_owned()));
        }

        let query: PriceQuery = serde_json::from_value(arguments).map_err(|error| {
            ToolExecutionError::InvalidInput { tool: name.to_owned(), message: error.to_string() }
        })?;

        serde_json::to_string(&self.lookup(&query))
            .map_err(|error| ToolExecutionError::Failed { tool: name.to_owned(), message: error.to_string() })
    }
}
