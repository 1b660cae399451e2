use thiserror::Error;

use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("malformed record response: {0}")]
    MalformedResponse(String),
    #[error("invalid conversation history: {0}")]
    InvalidHistory(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("tool `{0}` is not available")]
    ToolNotFound(String),
    #[error("tool `{tool}` failed: {message}")]
    ToolExecution { tool: String, message: String },
    #[error("malformed response from `{tool}`: {message}")]
    MalformedResponse { tool: String, message: String },
    #[error("could not resolve relationship `{relationship}`: {message}")]
    RelationshipFetch { relationship: String, message: String },
    #[error("model failure: {0}")]
    Model(String),
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
            Self::BadRequest { .. } => "The request could not be processed. Check inputs and try again.",
            Self::ServiceUnavailable { .. } => {
                "The assistant is temporarily unavailable. Please retry shortly."
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

    /// Text placed into a ToolResult message when a tool call fails. The model
    /// reads this as one line, so embedded line breaks are collapsed.
    pub fn tool_result_text(&self) -> String {
        let text = match self {
            Self::ToolNotFound(name) => format!("Error: tool `{name}` is not available."),
            Self::ToolExecution { tool, message } => format!("Error executing tool `{tool}`: {message}"),
            other => format!("Error: {other}"),
        };
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::ToolNotFound(_)
            | ApplicationError::ToolExecution { .. }
            | ApplicationError::MalformedResponse { .. }
            | ApplicationError::RelationshipFetch { .. }
            | ApplicationError::Model(_) => {
                Self::ServiceUnavailable { message: value.to_string(), correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn invalid_history_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::InvalidHistory("orphan tool result".to_owned()))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "The request could not be processed. Check inputs and try again.");
    }

    #[test]
    fn model_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Model("connection refused".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-3");
        assert_eq!(interface.user_message(), "The assistant is temporarily unavailable. Please retry shortly.");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("missing llm api key".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn tool_result_text_is_single_line_and_readable() {
        let missing = ApplicationError::ToolNotFound("get_weather".to_owned());
        assert_eq!(missing.tool_result_text(), "Error: tool `get_weather` is not available.");

        let failed = ApplicationError::ToolExecution {
            tool: "get_records".to_owned(),
            message: "upstream returned 503".to_owned(),
        };
        assert_eq!(failed.tool_result_text(), "Error executing tool `get_records`: upstream returned 503");
        assert!(!failed.tool_result_text().contains('\n'));
    }

    #[test]
    fn multi_line_tool_failure_is_collapsed() {
        let failed = ApplicationError::ToolExecution {
            tool: "get_record_applicant".to_owned(),
            message: "record 9 not found\n  try another id\n".to_owned(),
        };

        assert_eq!(
            failed.tool_result_text(),
            "Error executing tool `get_record_applicant`: record 9 not found try another id"
        );
    }
}
