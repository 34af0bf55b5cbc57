//! Error types for the cluster-rollout crate.

use thiserror::Error;

use crate::persistence::StoreError;

/// Main error type for topology control operations
#[derive(Error, Debug)]
pub enum ControlError {
    /// Component/service/stack combination not recognized by stack metadata
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Entity already present under the same key
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    /// Lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Deletion blocked by a non-removable member
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Inconsistent bulk arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Durable store failure, propagated unmodified
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Type alias for Result with ControlError
pub type ControlResult<T> = Result<T, ControlError>;
