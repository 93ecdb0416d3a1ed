//! Error types for provisioning operations

use thiserror::Error;

/// Errors that can occur while provisioning a host
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Remote API call failed in a retryable way (connect error, timeout, 429/5xx)
    #[error("Transient error: {0}")]
    Transient(String),

    /// Remote API rejected the request (4xx, auth failure) - not retried
    #[error("Permanent error: {0}")]
    Permanent(String),

    /// Mutated reservation file failed structural validation; original left untouched
    #[error("Invalid reservation file: {0}")]
    InvalidConfig(String),

    /// Conflicting reservations: one MAC claimed by more than one block
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Host-vars output already exists with different content
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Reservation file or host-vars I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Deployment trigger failure
    #[error("Deployment error: {0}")]
    Deployment(String),
}

impl ProvisioningError {
    /// Whether this error is eligible for bounded retry with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ProvisioningError::Transient(_))
    }

    /// Escalate a transient error after retry exhaustion
    pub fn into_permanent(self) -> Self {
        match self {
            ProvisioningError::Transient(msg) => {
                ProvisioningError::Permanent(format!("retries exhausted: {}", msg))
            }
            other => other,
        }
    }
}

/// Result type for provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

impl From<std::io::Error> for ProvisioningError {
    fn from(err: std::io::Error) -> Self {
        ProvisioningError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProvisioningError {
    fn from(err: serde_json::Error) -> Self {
        ProvisioningError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ProvisioningError {
    fn from(err: reqwest::Error) -> Self {
        // Connection-level and timeout failures are retryable; anything that
        // produced a response is classified by the adapter from the status.
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ProvisioningError::Transient(err.to_string())
        } else {
            ProvisioningError::Permanent(err.to_string())
        }
    }
}

/// Classify an HTTP status into transient/permanent per the retry taxonomy
pub fn classify_status(status: reqwest::StatusCode, body: &str) -> ProvisioningError {
    if status.as_u16() == 429 || status.is_server_error() {
        ProvisioningError::Transient(format!("HTTP {}: {}", status, body))
    } else {
        ProvisioningError::Permanent(format!("HTTP {}: {}", status, body))
    }
}
