//! Dispatch error types.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the collector, the dispatcher and the HTTP surface.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("scoring oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("scoring oracle did not answer within {}ms", .0.as_millis())]
    OracleTimeout(Duration),

    #[error("scoring oracle contract violation: {0}")]
    OracleContractViolation(String),

    #[error("method {0} not allowed")]
    MethodNotSupported(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Coarse classification reported to callers. A timeout is an
/// `OracleUnavailable` failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    OracleUnavailable,
    OracleContractViolation,
    MethodNotSupported,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::OracleUnavailable => "oracle_unavailable",
            ErrorKind::OracleContractViolation => "oracle_contract_violation",
            ErrorKind::MethodNotSupported => "method_not_supported",
        }
    }
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::MalformedInput(_) => ErrorKind::MalformedInput,
            DispatchError::OracleUnavailable(_) | DispatchError::OracleTimeout(_) => {
                ErrorKind::OracleUnavailable
            }
            DispatchError::OracleContractViolation(_) => ErrorKind::OracleContractViolation,
            DispatchError::MethodNotSupported(_) => ErrorKind::MethodNotSupported,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            DispatchError::OracleUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::OracleTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::OracleContractViolation(_) => StatusCode::BAD_GATEWAY,
            DispatchError::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Whether a bounded retry may re-attempt the oracle call.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::OracleUnavailable
    }
}
