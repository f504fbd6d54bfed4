//! Error types for tokenflow-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Deployment not found
    DeploymentNotFound,
    /// Deployment id already taken
    DuplicateDeployment,
    /// Unparsable stored or requested value
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DeploymentNotFound => "deployment_not_found",
            ErrorKind::DuplicateDeployment => "duplicate_deployment",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    // Convenience constructors
    pub fn deployment_not_found(deployment_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::DeploymentNotFound,
            format!("Deployment not found: {}", deployment_id.into()),
        )
    }

    pub fn duplicate_deployment(deployment_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::DuplicateDeployment,
            format!("Deployment already exists: {}", deployment_id.into()),
        )
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::DeploymentNotFound
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
