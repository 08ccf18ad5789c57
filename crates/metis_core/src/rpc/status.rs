//! Transport status kinds and the domain-error mapping.
//!
//! # Invariants
//! - Every `ServiceError` maps to exactly one `StatusCode`.
//! - Unknown/internal failures map to `Internal` with an opaque message;
//!   details stay in server logs.

use crate::service::project_service::ServiceError;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const INTERNAL_MESSAGE: &str = "internal error";

/// Transport-level outcome class of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    Unauthenticated,
    PermissionDenied,
    Internal,
}

impl StatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission_denied",
            Self::Internal => "internal",
        }
    }
}

/// Error returned to RPC callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcStatus {
    pub code: StatusCode,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unauthenticated, message)
    }
}

impl Display for RpcStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl Error for RpcStatus {}

/// Maps a domain error to the status returned to the caller.
pub fn to_status(err: &ServiceError) -> RpcStatus {
    match err {
        ServiceError::InvalidId(_) => RpcStatus::new(StatusCode::InvalidArgument, err.to_string()),
        ServiceError::NotFound(_) => RpcStatus::new(StatusCode::NotFound, err.to_string()),
        ServiceError::Repo(_) | ServiceError::Document(_) | ServiceError::Content(_) => {
            RpcStatus::new(StatusCode::Internal, INTERNAL_MESSAGE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{to_status, StatusCode};
    use crate::document::DocError;
    use crate::model::id::EntityId;
    use crate::service::project_service::ServiceError;

    #[test]
    fn domain_errors_map_to_expected_codes() {
        let invalid = ServiceError::from(EntityId::parse("invalid").unwrap_err());
        assert_eq!(to_status(&invalid).code, StatusCode::InvalidArgument);

        let missing = ServiceError::NotFound(EntityId::generate());
        assert_eq!(to_status(&missing).code, StatusCode::NotFound);
    }

    #[test]
    fn internal_errors_are_opaque() {
        let err = ServiceError::Document(DocError::Connect("10.0.0.3 refused".to_string()));
        let status = to_status(&err);
        assert_eq!(status.code, StatusCode::Internal);
        assert!(!status.message.contains("10.0.0.3"));
    }
}
