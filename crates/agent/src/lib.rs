//! Cost-estimation agent runtime.
//!
//! The agent follows a constrained loop:
//! 1. **Session setup** (`sandbox`) - acquire a code-interpreter session for the task
//! 2. **Tool discovery** (`pricing`) - enumerate pricing tools from the catalog
//! 3. **Model loop** (`runtime`) - call the reasoning model, dispatch tool calls
//!    through the registry (`tools`), feed results back until a final answer
//! 4. **Teardown** - release the session exactly once, whatever happened
//!
//! The model never does arithmetic itself. Every number in an answer comes from a
//! pricing tool or from a script executed in the sandbox.

pub mod llm;
pub mod pricing;
pub mod runtime;
pub mod sandbox;
pub mod stream;
pub mod tools;

pub use llm::{LlmClient, ModelRequest, ModelTurn, ToolDescriptor};
pub use pricing::{PricingCatalog, StaticPriceCatalog};
pub use runtime::{CostEstimatorAgent, EstimationService};
pub use sandbox::{HttpSandboxProvider, SandboxProvider, SandboxedCalculator};
pub use stream::{DeltaTracker, EstimateEvent};
pub use tools::{Tool, ToolRegistry};
