//! Error types for the observable store.

use crate::types::BoxError;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Subscription attempted without params on a store that requires them.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An action's transition produced something that is not a partial state.
    #[error("Contract violation in action '{action}': {reason}")]
    ContractViolation { action: String, reason: String },

    /// A deferred transition result failed.
    #[error("Action '{action}' rejected: {source}")]
    Rejected {
        action: String,
        #[source]
        source: BoxError,
    },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid arguments for action '{action}': {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A commit attempt panicked or was cancelled by runtime shutdown.
    #[error("Commit task failed: {0}")]
    Join(String),
}

impl StoreError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Configuration(_) => "configuration",
            StoreError::ContractViolation { .. } => "contract_violation",
            StoreError::Rejected { .. } => "rejected",
            StoreError::UnknownAction(_) => "unknown_action",
            StoreError::InvalidArguments { .. } => "invalid_arguments",
            StoreError::InvalidState(_) => "invalid_state",
            StoreError::Serialization(_) => "serialization",
            StoreError::Join(_) => "join",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Join(e.to_string())
    }
}

/// Failure of a single observer delivery.
///
/// Never escalates past the broadcast that produced it.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("observer panicked: {0}")]
    Panicked(String),

    #[error("observer failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    /// Builds a `Panicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        DeliveryError::Panicked(msg)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Panicked(_) => "observer_panicked",
            DeliveryError::Failed(_) => "observer_failed",
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
