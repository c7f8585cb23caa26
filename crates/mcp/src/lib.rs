//! Pricing catalog backed by an MCP (Model Context Protocol) server.
//!
//! The configured server (by default `uvx awslabs.aws-pricing-mcp-server@latest`)
//! is spawned as a child process speaking MCP over stdio. Its tools are
//! discovered at task setup and exposed to the agent unchanged.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudcost_mcp::{McpPricingCatalog, ServerCommand};
//!
//! let command = ServerCommand::new("uvx", ["awslabs.aws-pricing-mcp-server@latest"])
//!     .with_env("AWS_REGION", "us-east-1");
//! let catalog = Arc::new(McpPricingCatalog::new(command));
//! ```

mod catalog;

pub use catalog::{McpPricingCatalog, ServerCommand};

use cloudcost_core::ToolExecutionError;
use thiserror::Error;

/// Errors specific to the MCP connection.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("could not spawn pricing server `{command}`: {source}")]
    Spawn { command: String, source: std::io::Error },

    #[error("pricing server handshake failed: {0}")]
    Handshake(String),

    #[error("pricing server request failed: {0}")]
    Request(String),
}

impl McpError {
    pub fn into_tool_error(self, tool: &str) -> ToolExecutionError {
        ToolExecutionError::Failed { tool: tool.to_owned(), message: self.to_string() }
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;
