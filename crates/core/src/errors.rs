use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown logic rule action `{0}`")]
    UnknownRuleAction(String),
    #[error("invalid product type `{0}`")]
    InvalidProductType(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
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
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

/// Failure categories surfaced to shoppers during checkout. Backend errors
/// arrive as loosely structured messages, so classification sniffs the status
/// code first and falls back to message substrings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutErrorKind {
    Network,
    Authentication,
    Validation,
    Duplicate,
    Permission,
    Payment,
    Generic,
}

impl CheckoutErrorKind {
    pub fn classify(status: Option<u16>, message: &str) -> Self {
        match status {
            Some(401) => return Self::Authentication,
            Some(403) => return Self::Permission,
            Some(409) => return Self::Duplicate,
            Some(402) => return Self::Payment,
            Some(400) | Some(422) => return Self::Validation,
            _ => {}
        }

        let message = message.to_ascii_lowercase();
        let contains_any = |needles: &[&str]| needles.iter().any(|needle| message.contains(needle));

        if contains_any(&["network", "fetch", "connection", "timed out", "timeout"]) {
            Self::Network
        } else if contains_any(&["jwt", "session", "unauthorized", "not authenticated"]) {
            Self::Authentication
        } else if contains_any(&["duplicate", "already exists", "unique constraint"]) {
            Self::Duplicate
        } else if contains_any(&["row-level security", "policy", "permission denied"]) {
            Self::Permission
        } else if contains_any(&["payment", "card", "declined"]) {
            Self::Payment
        } else if contains_any(&["required", "not-null", "null value", "invalid"]) {
            Self::Validation
        } else {
            Self::Generic
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network => "Connection problem. Check your internet connection and try again.",
            Self::Authentication => "Your session has expired. Please sign in again.",
            Self::Validation => "Some required information is missing. Review your details.",
            Self::Duplicate => "This order was already submitted.",
            Self::Permission => "You do not have permission to complete this action.",
            Self::Payment => "Payment could not be processed. Try another payment method.",
            Self::Generic => "Something went wrong while placing your order. Please try again.",
        }
    }
}
