use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::address::AddressId;
use crate::domain::customer::CustomerId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn status_label(status: &Option<u16>) -> String {
    status.map(|code| format!("status {code}")).unwrap_or_else(|| "no response".to_string())
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed for fields: {}", join_violations(.0))]
    Validation(Vec<FieldViolation>),
    #[error("Duplicate addresses are not allowed")]
    DuplicateAddress,
    #[error("{0}")]
    NotFound(String),
}

impl DomainError {
    pub fn customer_not_found(id: CustomerId) -> Self {
        Self::NotFound(format!("Customer not found with id: {id}"))
    }

    pub fn address_not_found(id: AddressId) -> Self {
        Self::NotFound(format!("Address not found with id: {id}"))
    }

    pub fn address_not_owned() -> Self {
        Self::NotFound("Address does not belong to this customer".to_string())
    }

    pub fn user_unavailable(user_id: UserId) -> Self {
        Self::NotFound(format!("Error fetching user with id: {user_id}"))
    }

    pub fn no_customers() -> Self {
        Self::NotFound("No customers found".to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("identity service failure ({}): {message}", status_label(.status))]
    Remote { status: Option<u16>, message: String },
    #[error("Failed to create customer: {0}")]
    CreateFailed(Box<ApplicationError>),
    #[error("Failed to rollback user creation after `{original}`: {compensation}")]
    CompensationFailed { original: Box<ApplicationError>, compensation: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl ApplicationError {
    pub fn create_failed(cause: impl Into<ApplicationError>) -> Self {
        Self::CreateFailed(Box::new(cause.into()))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Domain(DomainError::NotFound(_)) => true,
            Self::Remote { status: Some(404), .. } => true,
            Self::CreateFailed(inner) => inner.is_not_found(),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, details: Vec<String>, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "The request could not be processed. Check inputs and try again.",
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::BadGateway { .. } => {
                "The identity service could not complete the request. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. }
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
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

const UNASSIGNED: &str = "unassigned";

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::Validation(violations)) => Self::BadRequest {
                message: "Validation failed for fields".to_owned(),
                details: violations.iter().map(ToString::to_string).collect(),
                correlation_id: UNASSIGNED.to_owned(),
            },
            ApplicationError::Domain(DomainError::DuplicateAddress) => Self::BadRequest {
                message: DomainError::DuplicateAddress.to_string(),
                details: Vec::new(),
                correlation_id: UNASSIGNED.to_owned(),
            },
            ApplicationError::Domain(DomainError::NotFound(message)) => {
                Self::NotFound { message, correlation_id: UNASSIGNED.to_owned() }
            }
            ApplicationError::Remote { status: Some(400 | 422), message } => Self::BadRequest {
                message: "Validation Error".to_owned(),
                details: vec![message],
                correlation_id: UNASSIGNED.to_owned(),
            },
            ApplicationError::Remote { status: Some(404), message } => {
                Self::NotFound { message, correlation_id: UNASSIGNED.to_owned() }
            }
            ApplicationError::Remote { status, message } => Self::BadGateway {
                message: format!("identity service failure ({}): {message}", status_label(&status)),
                correlation_id: UNASSIGNED.to_owned(),
            },
            ApplicationError::CreateFailed(inner) => Self::from(*inner),
            error @ ApplicationError::CompensationFailed { .. } => {
                Self::Internal { message: error.to_string(), correlation_id: UNASSIGNED.to_owned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Internal(message) => {
                Self::Internal { message, correlation_id: UNASSIGNED.to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::customer::CustomerId;
    use crate::errors::{ApplicationError, DomainError, FieldViolation, InterfaceError};

    #[test]
    fn validation_error_keeps_every_violation() {
        let interface = ApplicationError::from(DomainError::Validation(vec![
            FieldViolation::new("name", "Name is required"),
            FieldViolation::new("email", "Email is required"),
        ]))
        .into_interface("req-1");

        match interface {
            InterfaceError::BadRequest { details, correlation_id, .. } => {
                assert_eq!(details, vec!["name: Name is required", "email: Email is required"]);
                assert_eq!(correlation_id, "req-1");
            }
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[test]
    fn not_found_keeps_message() {
        let interface = ApplicationError::from(DomainError::customer_not_found(CustomerId(42)))
            .into_interface("req-2");

        assert_eq!(
            interface,
            InterfaceError::NotFound {
                message: "Customer not found with id: 42".to_string(),
                correlation_id: "req-2".to_string(),
            }
        );
        assert_eq!(interface.user_message(), "The requested resource does not exist.");
    }

    #[test]
    fn upstream_bad_input_maps_to_bad_request_with_upstream_message() {
        let interface = ApplicationError::Remote {
            status: Some(400),
            message: "cpf already registered".to_string(),
        }
        .into_interface("req-3");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref details, .. } if details == &vec!["cpf already registered".to_string()]
        ));
    }

    #[test]
    fn other_upstream_failures_map_to_bad_gateway() {
        let interface =
            ApplicationError::Remote { status: Some(503), message: "down".to_string() }
                .into_interface("req-4");
        assert!(matches!(interface, InterfaceError::BadGateway { .. }));

        let timeout = ApplicationError::Remote { status: None, message: "timed out".to_string() }
            .into_interface("req-5");
        assert!(matches!(timeout, InterfaceError::BadGateway { ref message, .. } if message.contains("no response")));
    }

    #[test]
    fn create_failed_maps_by_its_cause() {
        let interface = ApplicationError::create_failed(ApplicationError::Remote {
            status: Some(422),
            message: "email taken".to_string(),
        })
        .into_interface("req-6");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn compensation_failure_is_internal_and_names_both_errors() {
        let error = ApplicationError::CompensationFailed {
            original: Box::new(ApplicationError::Persistence("disk full".to_string())),
            compensation: "identity.delete_user: timed out".to_string(),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("disk full"));
        assert!(rendered.contains("identity.delete_user"));

        let interface = error.into_interface("req-7");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn not_found_detection_sees_through_create_failures() {
        assert!(ApplicationError::from(DomainError::no_customers()).is_not_found());
        assert!(ApplicationError::create_failed(ApplicationError::Remote {
            status: Some(404),
            message: "profile missing".to_string(),
        })
        .is_not_found());
        assert!(!ApplicationError::Internal("boom".to_string()).is_not_found());
    }
}
