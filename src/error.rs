//! Error types for the Skald promotion engine.
//!
//! This module provides the error hierarchy for the promotion lifecycle:
//! plan construction, pre-write validation, backend store access, and
//! ambient configuration. Fatal classes (`PlanningError`, `ValidationError`)
//! abort a promotion before any write; per-entry conditions (a rejected
//! delete, a failed adapter call) are not errors at all; they accumulate in
//! the [`SyncReport`](crate::sync::SyncReport) instead.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Skald promotion engine.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Plan construction errors.
    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    /// Pre-write validation errors.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Backend store and lock errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Settings loading errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fatal errors raised while constructing or interpreting a sync plan.
///
/// All variants abort the promotion before any write reaches the target.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// The dependency graph contains a cycle.
    #[error("Cyclic dependency between resources: {cycle}")]
    DependencyCycle {
        /// Human-readable description of the cycle members.
        cycle: String,
    },

    /// No promotion strategy is registered for a resource type.
    #[error("No promotion strategy registered for resource type: {resource_type}")]
    UnsupportedResourceType {
        /// The unregistered resource type.
        resource_type: String,
    },

    /// A live entity could not be reduced to a canonical snapshot.
    #[error("Unreadable snapshot for {resource_type} '{resource_id}': {reason}")]
    UnreadableSnapshot {
        /// Type of the offending resource.
        resource_type: String,
        /// Environment-internal id of the offending resource.
        resource_id: String,
        /// Why normalization failed.
        reason: String,
    },

    /// The business key field is missing or empty.
    #[error("Missing business key for {resource_type} '{resource_id}'")]
    MissingBusinessKey {
        /// Type of the offending resource.
        resource_type: String,
        /// Environment-internal id of the offending resource.
        resource_id: String,
    },

    /// Two live resources of one type share a business key in one environment.
    #[error("Duplicate business key '{business_key}' for {resource_type} in environment {environment_id}")]
    DuplicateBusinessKey {
        /// Type of the colliding resources.
        resource_type: String,
        /// The shared business key.
        business_key: String,
        /// Environment the collision was observed in.
        environment_id: String,
    },

    /// The legacy path was asked to promote a resource with no enabled changes.
    #[error("Nothing to promote for {resource_type} '{resource_id}': no enabled changes")]
    NothingToPromote {
        /// Type of the resource.
        resource_type: String,
        /// Id of the resource with an empty replay.
        resource_id: String,
    },
}

/// Fatal pre-write validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The named environment does not exist.
    #[error("Environment not found: {environment_id}")]
    EnvironmentNotFound {
        /// The missing environment id.
        environment_id: String,
    },

    /// Source and target belong to different organizations.
    #[error("Environment {target_environment_id} belongs to a different organization than {source_environment_id}")]
    OrganizationMismatch {
        /// Source environment id.
        source_environment_id: String,
        /// Target environment id.
        target_environment_id: String,
    },

    /// The target is not a declared promotion target of the source.
    #[error("Environment {target_environment_id} is not a promotion target of {source_environment_id}")]
    NotAPromotionTarget {
        /// Source environment id.
        source_environment_id: String,
        /// Target environment id.
        target_environment_id: String,
    },

    /// The actor lacks promotion permission.
    #[error("Actor '{actor}' may not promote into environment {target_environment_id}")]
    PermissionDenied {
        /// The rejected actor id.
        actor: String,
        /// The environment the actor was denied for.
        target_environment_id: String,
    },

    /// Another promotion holds the target environment lock.
    #[error("Environment {environment_id} is locked by another promotion (holder: {holder}); retry later")]
    TargetLocked {
        /// The contended environment id.
        environment_id: String,
        /// Identifier of the current lock holder.
        holder: String,
    },
}

/// Backend store, bundle, and lock errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An underlying backend call failed.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// Lock acquisition or release failed.
    #[error("Failed to operate promotion lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// Serialization of a record or bundle failed.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// The environment bundle file was not found.
    #[error("Bundle file not found: {path}")]
    BundleNotFound {
        /// Path to the missing bundle.
        path: PathBuf,
    },

    /// Stored data could not be parsed.
    #[error("Stored data is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

/// Settings loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file was not found.
    #[error("Settings file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The settings file could not be parsed.
    #[error("Failed to parse settings: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A settings value failed validation.
    #[error("Invalid settings: {message}")]
    Invalid {
        /// Description of the invalid value.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Result type alias for promotion operations.
pub type Result<T> = std::result::Result<T, PromotionError>;

impl PromotionError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    ///
    /// A locked target environment and transient lock-store failures clear on
    /// their own; everything else needs operator attention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Validation(ValidationError::TargetLocked { .. })
                | Self::Store(StoreError::LockFailed { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Validation(ValidationError::TargetLocked { .. }) => Some(5),
            Self::Store(StoreError::LockFailed { .. }) => Some(2),
            _ => None,
        }
    }
}

impl StoreError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific settings field.
    #[must_use]
    pub fn invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_locked_is_retryable() {
        let err = PromotionError::Validation(ValidationError::TargetLocked {
            environment_id: String::from("env-prod"),
            holder: String::from("host-1234-abcd"),
        });

        assert!(err.is_retryable());
        assert_eq!(err.retry_delay_secs(), Some(5));
    }

    #[test]
    fn test_planning_errors_are_not_retryable() {
        let err = PromotionError::Planning(PlanningError::DependencyCycle {
            cycle: String::from("workflow:a -> layout:b -> workflow:a"),
        });

        assert!(!err.is_retryable());
        assert_eq!(err.retry_delay_secs(), None);
    }
}
