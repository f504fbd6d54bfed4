use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a deployment failure, recorded on the `Failed` history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeploymentErrorCategory {
    Unknown,
    NetworkError,
    ValidationError,
    ComplianceError,
    UserRejection,
    InsufficientFunds,
    TransactionFailure,
    ConfigurationError,
    RateLimitExceeded,
    InternalError,
}

impl DeploymentErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentErrorCategory::Unknown => "Unknown",
            DeploymentErrorCategory::NetworkError => "NetworkError",
            DeploymentErrorCategory::ValidationError => "ValidationError",
            DeploymentErrorCategory::ComplianceError => "ComplianceError",
            DeploymentErrorCategory::UserRejection => "UserRejection",
            DeploymentErrorCategory::InsufficientFunds => "InsufficientFunds",
            DeploymentErrorCategory::TransactionFailure => "TransactionFailure",
            DeploymentErrorCategory::ConfigurationError => "ConfigurationError",
            DeploymentErrorCategory::RateLimitExceeded => "RateLimitExceeded",
            DeploymentErrorCategory::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for DeploymentErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured failure descriptor for `Failed` transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentError {
    pub category: DeploymentErrorCategory,
    pub error_code: String,
    /// Operator-facing detail; kept in the audit trail, never shown to end users
    pub technical_message: String,
    pub user_message: String,
    pub is_retryable: bool,
    pub suggested_retry_delay_seconds: Option<u32>,
}

impl DeploymentError {
    pub fn new(
        category: DeploymentErrorCategory,
        error_code: impl Into<String>,
        technical_message: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            error_code: error_code.into(),
            technical_message: technical_message.into(),
            user_message: user_message.into(),
            is_retryable: false,
            suggested_retry_delay_seconds: None,
        }
    }

    pub fn retryable_after(mut self, delay_seconds: u32) -> Self {
        self.is_retryable = true;
        self.suggested_retry_delay_seconds = Some(delay_seconds);
        self
    }

    pub fn network(technical_message: impl Into<String>) -> Self {
        Self::new(
            DeploymentErrorCategory::NetworkError,
            "NETWORK_ERROR",
            technical_message,
            "The blockchain network could not be reached. Please try again shortly.",
        )
        .retryable_after(30)
    }

    pub fn insufficient_funds(required: impl fmt::Display, available: impl fmt::Display) -> Self {
        Self::new(
            DeploymentErrorCategory::InsufficientFunds,
            "INSUFFICIENT_FUNDS",
            format!("Required {}, available {}", required, available),
            "The deployer account does not hold enough funds to cover this deployment.",
        )
    }

    pub fn validation(technical_message: impl Into<String>) -> Self {
        Self::new(
            DeploymentErrorCategory::ValidationError,
            "INVALID_TOKEN_PARAMETERS",
            technical_message,
            "The token parameters are invalid. Please correct them and submit again.",
        )
    }

    pub fn compliance(technical_message: impl Into<String>) -> Self {
        Self::new(
            DeploymentErrorCategory::ComplianceError,
            "COMPLIANCE_CHECK_FAILED",
            technical_message,
            "This deployment did not pass compliance checks.",
        )
    }

    pub fn transaction_failure(technical_message: impl Into<String>) -> Self {
        Self::new(
            DeploymentErrorCategory::TransactionFailure,
            "TRANSACTION_FAILED",
            technical_message,
            "The deployment transaction was rejected by the network.",
        )
        .retryable_after(60)
    }

    pub fn rate_limited(retry_after_seconds: u32) -> Self {
        Self::new(
            DeploymentErrorCategory::RateLimitExceeded,
            "RATE_LIMIT_EXCEEDED",
            format!("Rate limit hit, retry after {}s", retry_after_seconds),
            "Too many requests. Please wait before retrying.",
        )
        .retryable_after(retry_after_seconds)
    }

    pub fn internal(technical_message: impl Into<String>) -> Self {
        Self::new(
            DeploymentErrorCategory::InternalError,
            "INTERNAL_SERVER_ERROR",
            technical_message,
            "An unexpected error occurred. Please contact support.",
        )
    }
}
