use thiserror::Error;

/// The sandbox session could not be acquired.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("sandbox provider unreachable: {0}")]
    Unreachable(String),
    #[error("sandbox quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("sandbox provider rejected session start: {0}")]
    Rejected(String),
}

/// A tool call failed. Degraded to a string before the model sees it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolExecutionError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid input for tool `{tool}`: {message}")]
    InvalidInput { tool: String, message: String },
    #[error("code interpreter session is not active")]
    SessionInactive,
    #[error("tool `{tool}` failed: {message}")]
    Failed { tool: String, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelInvocationError {
    #[error("reasoning model unreachable: {0}")]
    Unreachable(String),
    #[error("reasoning model returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("reasoning model response was malformed: {0}")]
    Malformed(String),
    #[error("reasoning model exceeded {0} tool rounds without a final answer")]
    StepLimit(u32),
}

/// Session release failed. Logged by the caller, never surfaced.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("sandbox teardown failed: {0}")]
pub struct TeardownError(pub String);

/// Faults that end a task early. Rendered into a diagnostic response at the
/// agent boundary.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
    #[error("pricing tool discovery failed: {0}")]
    Discovery(#[source] ToolExecutionError),
    #[error(transparent)]
    Model(#[from] ModelInvocationError),
    #[error("estimation prompt could not be rendered: {0}")]
    Prompt(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("validation failure: {0}")]
    Validation(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Validation(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ApplicationError, InterfaceError, ProvisioningError, TaskError, ToolExecutionError,
    };

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface =
            ApplicationError::Validation("prompt is required".to_owned()).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn integration_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Integration("model endpoint down".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing api key".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn task_error_keeps_provisioning_message() {
        let error = TaskError::from(ProvisioningError::QuotaExhausted("3 of 3 in use".to_owned()));
        assert_eq!(error.to_string(), "sandbox quota exhausted: 3 of 3 in use");
    }

    #[test]
    fn discovery_error_names_the_failing_step() {
        let error = TaskError::Discovery(ToolExecutionError::Failed {
            tool: "list_tools".to_owned(),
            message: "server exited".to_owned(),
        });
        assert_eq!(
            error.to_string(),
            "pricing tool discovery failed: tool `list_tools` failed: server exited"
        );
    }
}
