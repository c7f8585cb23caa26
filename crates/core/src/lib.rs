pub mod config;
pub mod domain;
pub mod errors;
pub mod prompts;

pub use domain::pricing::{PriceLookup, PriceQuery, PriceRecord};
pub use domain::session::{Session, SessionId, SessionState, SessionTransitionError};
pub use domain::task::{
    diagnostic_message, CalculationResult, Response, ResponseOutcome, Task, TaskId, ToolCall,
    NO_RESULT_SENTINEL,
};
pub use errors::{
    ApplicationError, InterfaceError, ModelInvocationError, ProvisioningError, TaskError,
    TeardownError, ToolExecutionError,
};
