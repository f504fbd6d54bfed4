use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenflow_storage::StorageError;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors from service operations (store access, export rendering).
///
/// Pipeline runs never produce this type: their failures are folded into
/// `OrchestrationResult`.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Failure taxonomy shared by the pipeline and the deployment services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    ValidationFailure,
    PreconditionFailure,
    TransientInfrastructureFailure,
    PolicyFailure,
    PostCommitVerificationFailure,
    TerminalExecutionFailure,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 6] = [
        FailureCategory::ValidationFailure,
        FailureCategory::PreconditionFailure,
        FailureCategory::TransientInfrastructureFailure,
        FailureCategory::PolicyFailure,
        FailureCategory::PostCommitVerificationFailure,
        FailureCategory::TerminalExecutionFailure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::ValidationFailure => "ValidationFailure",
            FailureCategory::PreconditionFailure => "PreconditionFailure",
            FailureCategory::TransientInfrastructureFailure => "TransientInfrastructureFailure",
            FailureCategory::PolicyFailure => "PolicyFailure",
            FailureCategory::PostCommitVerificationFailure => "PostCommitVerificationFailure",
            FailureCategory::TerminalExecutionFailure => "TerminalExecutionFailure",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Fixed guidance text per category; identical inputs always yield identical hints
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            FailureCategory::ValidationFailure => {
                "Review and correct the request parameters, then submit the request again."
            }
            FailureCategory::PreconditionFailure => {
                "Resolve the unmet precondition described in the error message, then retry the request."
            }
            FailureCategory::TransientInfrastructureFailure => {
                "A temporary infrastructure problem occurred. Retry with exponential back-off, \
                 reusing the same idempotency key so the operation is not duplicated."
            }
            FailureCategory::PolicyFailure => {
                "The request is not permitted by platform policy. Review the platform usage \
                 policy or contact support for assistance."
            }
            FailureCategory::PostCommitVerificationFailure => {
                "The operation may have been applied but could not be verified. Do not resubmit; \
                 contact support and provide the correlation id."
            }
            FailureCategory::TerminalExecutionFailure => {
                "The operation could not be completed. Contact support and provide the \
                 correlation id before submitting the request again."
            }
        }
    }

    /// Only transient infrastructure failures are safe to retry automatically
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureCategory::TransientInfrastructureFailure)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    MissingRequiredField,
    InvalidNetwork,
    InvalidTokenParameters,
    PreconditionFailed,
    PolicyViolation,
    Unauthorized,
    Forbidden,
    NotFound,
    AlreadyExists,
    BlockchainTimeout,
    NetworkError,
    InsufficientFunds,
    TransactionFailed,
    OperationFailed,
    PostCommitVerificationFailed,
    RateLimitExceeded,
    IpfsServiceError,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidNetwork => "INVALID_NETWORK",
            ErrorCode::InvalidTokenParameters => "INVALID_TOKEN_PARAMETERS",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::PolicyViolation => "POLICY_VIOLATION",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::BlockchainTimeout => "BLOCKCHAIN_TIMEOUT",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::TransactionFailed => "TRANSACTION_FAILED",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
            ErrorCode::PostCommitVerificationFailed => "POST_COMMIT_VERIFICATION_FAILED",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::IpfsServiceError => "IPFS_SERVICE_ERROR",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    /// User-facing message for codes produced from internal errors.
    ///
    /// Internal error text never reaches a result; this is shown instead.
    pub fn public_message(&self) -> &'static str {
        match self {
            ErrorCode::BlockchainTimeout => {
                "The operation timed out while waiting for the blockchain network."
            }
            ErrorCode::NetworkError => "A network error occurred while processing the operation.",
            ErrorCode::OperationFailed => {
                "The operation could not be performed in the current state."
            }
            ErrorCode::PostCommitVerificationFailed => {
                "The operation completed but its result could not be verified."
            }
            ErrorCode::InsufficientFunds => "The account does not hold enough funds.",
            ErrorCode::TransactionFailed => "The transaction was rejected by the network.",
            ErrorCode::RateLimitExceeded => "Too many requests.",
            ErrorCode::IpfsServiceError => "The metadata storage service is unavailable.",
            ErrorCode::NotFound => "The requested resource was not found.",
            ErrorCode::AlreadyExists => "The resource already exists.",
            ErrorCode::Unauthorized => "Authentication is required.",
            ErrorCode::Forbidden => "The operation is not permitted for this account.",
            ErrorCode::PolicyViolation => "The operation is not permitted by platform policy.",
            ErrorCode::PreconditionFailed => "A precondition for the operation was not met.",
            ErrorCode::InvalidRequest
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidNetwork
            | ErrorCode::InvalidTokenParameters => "The request is invalid.",
            ErrorCode::InternalServerError => "An unexpected error occurred.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Closed set of failure kinds an executor or verifier may report.
///
/// Classification is a `match` over this enum, not an inspection of the
/// error's runtime type or text.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid operation state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecutionFailure {
    pub fn timeout<E: std::fmt::Display>(e: E) -> Self {
        Self::Timeout(e.to_string())
    }

    pub fn network<E: std::fmt::Display>(e: E) -> Self {
        Self::Network(e.to_string())
    }

    pub fn invalid_state<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidState(e.to_string())
    }

    pub fn classify(&self) -> (ErrorCode, FailureCategory) {
        match self {
            ExecutionFailure::Timeout(_) => (
                ErrorCode::BlockchainTimeout,
                FailureCategory::TransientInfrastructureFailure,
            ),
            ExecutionFailure::Network(_) => (
                ErrorCode::NetworkError,
                FailureCategory::TransientInfrastructureFailure,
            ),
            ExecutionFailure::InvalidState(_) => (
                ErrorCode::OperationFailed,
                FailureCategory::TerminalExecutionFailure,
            ),
            ExecutionFailure::Other(_) => (
                ErrorCode::InternalServerError,
                FailureCategory::TerminalExecutionFailure,
            ),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ExecutionFailure {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Self::timeout(e)
    }
}

impl From<std::io::Error> for ExecutionFailure {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::TimedOut => Self::timeout(e),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::AddrNotAvailable => Self::network(e),
            _ => Self::Other(e.into()),
        }
    }
}
